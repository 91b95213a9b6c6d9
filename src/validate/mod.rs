//! Structural checks run before any edit is queued.
//!
//! Every check here is a pure predicate over declarations and parameter
//! lists. Failures name the specific rule via [`OrderRule`].

use crate::error::OrderRule;
use crate::refactor::Permutation;
use crate::symbol::{Declaration, Parameter};

/// True when no required parameter follows an optional one.
pub fn optional_trailing<'p>(params: impl IntoIterator<Item = &'p Parameter>) -> bool {
    first_required_after_optional(params).is_none()
}

/// True when a `ParamArray` parameter, if any, is the single last parameter.
pub fn variadic_is_last<'p>(params: impl IntoIterator<Item = &'p Parameter>) -> bool {
    misplaced_param_array(params).is_none()
}

/// Check a requested order against the parameter rules.
///
/// `params` is the original (reorderable) parameter list; the permutation
/// maps new positions to old ones and is applied without mutating `params`.
///
/// # Errors
/// - `NotAPermutation` - the permutation length differs from the list
/// - `OptionalNotTrailing` - a required parameter would follow an optional one
/// - `ParamArrayNotLast` - the `ParamArray` parameter would not be last
pub fn validate_order(params: &[Parameter], permutation: &Permutation) -> Result<(), OrderRule> {
    if permutation.len() != params.len() {
        return Err(OrderRule::NotAPermutation {
            expected: params.len(),
            found: permutation.new_to_old().to_vec(),
        });
    }

    let reordered: Vec<&Parameter> = permutation.apply(params);

    if let Some(parameter) = first_required_after_optional(reordered.iter().copied()) {
        return Err(OrderRule::OptionalNotTrailing {
            parameter: parameter.name.clone(),
        });
    }
    if let Some(parameter) = misplaced_param_array(reordered.iter().copied()) {
        return Err(OrderRule::ParamArrayNotLast {
            parameter: parameter.name.clone(),
        });
    }
    Ok(())
}

/// True when two property accessors have identical non-value parameter lists.
///
/// Names compare case-insensitively, types ignoring case and whitespace; a
/// missing `As` clause counts as `Variant`.
pub fn accessor_signatures_match(a: &Declaration, b: &Declaration) -> bool {
    let left = a.reorderable_parameters();
    let right = b.reorderable_parameters();
    left.len() == right.len()
        && left.iter().zip(right).all(|(x, y)| {
            x.name.eq_ignore_ascii_case(&y.name) && normalized_type(x) == normalized_type(y)
        })
}

fn normalized_type(parameter: &Parameter) -> String {
    parameter
        .declared_type
        .as_deref()
        .unwrap_or("Variant")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn first_required_after_optional<'p>(
    params: impl IntoIterator<Item = &'p Parameter>,
) -> Option<&'p Parameter> {
    let mut seen_optional = false;
    for parameter in params {
        if parameter.is_optional {
            seen_optional = true;
        } else if seen_optional && !parameter.is_param_array {
            return Some(parameter);
        }
    }
    None
}

fn misplaced_param_array<'p>(params: impl IntoIterator<Item = &'p Parameter>) -> Option<&'p Parameter> {
    let params: Vec<&Parameter> = params.into_iter().collect();
    let last = params.len().checked_sub(1)?;
    params
        .iter()
        .enumerate()
        .find(|(position, p)| p.is_param_array && *position != last)
        .map(|(_, p)| *p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Extent;

    fn param(name: &str, optional: bool, param_array: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            declared_type: Some("Long".to_string()),
            position: 0,
            is_optional: optional,
            is_param_array: param_array,
            is_by_val: true,
            default_value: None,
            text: name.to_string(),
            extent: Extent::default(),
        }
    }

    fn order(positions: &[usize]) -> Permutation {
        Permutation::from_order(positions.to_vec(), positions.len()).unwrap()
    }

    #[test]
    fn test_optional_must_trail() {
        let params = vec![param("a", false, false), param("b", true, false)];
        assert!(optional_trailing(&params));
        assert!(validate_order(&params, &order(&[0, 1])).is_ok());

        match validate_order(&params, &order(&[1, 0])) {
            Err(OrderRule::OptionalNotTrailing { parameter }) => assert_eq!(parameter, "a"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_param_array_must_be_last() {
        let params = vec![param("a", false, false), param("rest", false, true)];
        assert!(variadic_is_last(&params));
        match validate_order(&params, &order(&[1, 0])) {
            Err(OrderRule::ParamArrayNotLast { parameter }) => assert_eq!(parameter, "rest"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_length_mismatch_is_not_a_permutation() {
        let params = vec![param("a", false, false), param("b", false, false)];
        let three = order(&[2, 0, 1]);
        assert!(matches!(
            validate_order(&params, &three),
            Err(OrderRule::NotAPermutation { expected: 2, .. })
        ));
    }

    #[test]
    fn test_empty_list_is_valid() {
        let params: Vec<Parameter> = Vec::new();
        assert!(optional_trailing(&params));
        assert!(variadic_is_last(&params));
    }
}
