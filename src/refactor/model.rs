//! Request models handed to the actions.

use super::state_udt::ObjectStateUdt;
use crate::error::{OrderRule, RefactorError, Result};
use crate::symbol::{Declaration, DeclarationId};
use serde::Serialize;

/// Immutable mapping from new parameter positions to original ones.
///
/// The original parameter list is never reordered in place; consumers look
/// up `source_of(new_position)` against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permutation {
    new_to_old: Vec<usize>,
}

impl Permutation {
    /// Build from the requested order: `order[new] = old`.
    ///
    /// # Errors
    /// `NotAPermutation` when `order` is not a permutation of `0..len`.
    pub fn from_order(order: Vec<usize>, len: usize) -> std::result::Result<Self, OrderRule> {
        let mut seen = vec![false; len];
        let valid = order.len() == len
            && order.iter().all(|&old| {
                old < len && !std::mem::replace(&mut seen[old], true)
            });
        if !valid {
            return Err(OrderRule::NotAPermutation {
                expected: len,
                found: order,
            });
        }
        Ok(Self { new_to_old: order })
    }

    /// Identity of length `len`.
    pub fn identity(len: usize) -> Self {
        Self {
            new_to_old: (0..len).collect(),
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    /// True for the empty permutation.
    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }

    /// True when every position maps to itself.
    pub fn is_identity(&self) -> bool {
        self.new_to_old.iter().enumerate().all(|(new, old)| new == *old)
    }

    /// Original position placed at `new_position`.
    pub fn source_of(&self, new_position: usize) -> usize {
        self.new_to_old[new_position]
    }

    /// `new → old` table.
    pub fn new_to_old(&self) -> &[usize] {
        &self.new_to_old
    }

    /// `old → new` table.
    pub fn old_to_new(&self) -> Vec<usize> {
        let mut table = vec![0; self.new_to_old.len()];
        for (new, old) in self.new_to_old.iter().enumerate() {
            table[*old] = new;
        }
        table
    }

    /// The permutation undoing this one.
    pub fn inverse(&self) -> Self {
        Self {
            new_to_old: self.old_to_new(),
        }
    }

    /// Items in the new order, borrowed from the original slice.
    pub fn apply<'t, T>(&self, items: &'t [T]) -> Vec<&'t T> {
        self.new_to_old.iter().map(|old| &items[*old]).collect()
    }
}

/// Request to reorder the parameters of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderParametersModel {
    /// Member whose parameters move.
    pub target: DeclarationId,
    /// Requested order over the reorderable parameters.
    pub permutation: Permutation,
}

impl ReorderParametersModel {
    /// Model from positions: `order[new] = old`.
    ///
    /// The value parameter of `Property Let`/`Set` is not part of `order`.
    ///
    /// # Errors
    /// `InvalidParameterOrder` (`NotAPermutation`) when `order` does not list
    /// every reorderable position exactly once.
    pub fn new(target: &Declaration, order: Vec<usize>) -> Result<Self> {
        let permutation = Permutation::from_order(order, target.reorderable_parameters().len())
            .map_err(|rule| RefactorError::InvalidParameterOrder { rule })?;
        Ok(Self {
            target: target.id,
            permutation,
        })
    }

    /// Model from parameter names in their new order (case-insensitive).
    ///
    /// # Errors
    /// - `DeclarationNotFound` - a name is not a reorderable parameter
    /// - `InvalidParameterOrder` - names are missing or repeated
    pub fn by_names(target: &Declaration, names: &[&str]) -> Result<Self> {
        let params = target.reorderable_parameters();
        let order = names
            .iter()
            .map(|name| {
                params
                    .iter()
                    .position(|p| p.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        RefactorError::DeclarationNotFound(format!(
                            "parameter '{}' of {}",
                            name,
                            target.qualified_name()
                        ))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;
        Self::new(target, order)
    }
}

/// One field to encapsulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEncapsulation {
    /// Field declaration.
    pub field: DeclarationId,
    /// Generate only the getter.
    pub read_only: bool,
    /// Property name; defaults to the field name with its first letter capitalized.
    pub property_name: Option<String>,
}

impl FieldEncapsulation {
    /// Read-write request with the default property name.
    pub fn new(field: DeclarationId) -> Self {
        Self {
            field,
            read_only: false,
            property_name: None,
        }
    }

    /// Set the read-only flag.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the property name.
    pub fn named(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = Some(property_name.into());
        self
    }
}

/// Request to encapsulate fields, optionally into one private record.
#[derive(Debug, Clone, Default)]
pub struct EncapsulateFieldModel {
    /// Fields in insertion order.
    pub requests: Vec<FieldEncapsulation>,
    /// Aggregate the backing storage into a user-defined type.
    pub object_state: Option<ObjectStateUdt>,
}

impl EncapsulateFieldModel {
    /// Model with a backing field per request.
    pub fn new(requests: Vec<FieldEncapsulation>) -> Self {
        Self {
            requests,
            object_state: None,
        }
    }

    /// Aggregate the backing storage into `state`.
    pub fn with_object_state(mut self, state: ObjectStateUdt) -> Self {
        self.object_state = Some(state);
        self
    }
}
