//! Slot-based rewrites of argument and parameter lists.
//!
//! A [`SlotRewrite`] describes a comma-separated list inside a region of the
//! original text and what each new slot is filled with. Rewrites nest: a
//! slot filled from source text is rendered with every rewrite inside it
//! applied, so a call passed as an argument to another rewritten call is
//! rewritten too. The rendered regions are turned into line edits in one
//! planning pass per module.

use super::{LineRange, Rewriter};
use crate::error::Result;
use crate::source::ModuleSource;
use crate::symbol::Span;

/// Content of one output slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    /// Text of the original slot at this span, with nested rewrites applied.
    Source(Span),
    /// Empty slot (omitted optional argument).
    Empty,
    /// Literal text.
    Literal(String),
}

/// Refill of the slots of one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRewrite {
    /// Region owning the list; text outside the slots is kept.
    pub region: Span,
    /// Original slot spans in order.
    pub slots: Vec<Span>,
    /// New slot contents in order.
    pub fills: Vec<Fill>,
    /// Join continuation lines of the rendered region into one line.
    pub collapse: bool,
}

/// Render every rewrite of `source` and queue the resulting line edits.
///
/// Rewrites whose line ranges overlap are rendered together so that two
/// rewrites on one line produce a single edit.
///
/// # Errors
/// Propagates `OverlappingEdits`/`InvalidLineRange` from the rewriter.
pub fn queue_slot_rewrites(
    rewriter: &mut Rewriter<'_>,
    source: &ModuleSource,
    mut rewrites: Vec<SlotRewrite>,
) -> Result<()> {
    if rewrites.is_empty() {
        return Ok(());
    }
    rewrites.sort_by(|a, b| {
        a.region
            .start
            .cmp(&b.region.start)
            .then(b.region.end.cmp(&a.region.end))
    });

    let text = source.text();
    let mut groups: Vec<LineRange> = Vec::new();
    let mut covered_to = 0;
    for (position, rewrite) in rewrites.iter().enumerate() {
        if position > 0 && rewrite.region.start < covered_to {
            continue;
        }
        covered_to = rewrite.region.end;
        let range = LineRange::new(
            source.line_of(rewrite.region.start),
            source.line_of(rewrite.region.end),
        );
        match groups.last_mut() {
            Some(last) if last.overlaps(&range) => last.end = last.end.max(range.end),
            _ => groups.push(range),
        }
    }

    let module = source.id();
    for group in groups {
        let span = source.lines_span(group.start, group.end);
        let rendered = render(text, span, &rewrites, None);
        if rendered == span.text(text) {
            continue;
        }
        let new_lines: Vec<&str> = rendered
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        let old_count = group.end - group.start + 1;

        if new_lines.len() == old_count {
            for (offset, line) in new_lines.iter().enumerate() {
                let number = group.start + offset;
                if *line != source.line_text(number) {
                    rewriter.queue_replace(module, LineRange::line(number), *line)?;
                }
            }
        } else if new_lines.len() == 1 {
            rewriter.queue_replace(module, LineRange::line(group.start), new_lines[0])?;
            rewriter.queue_delete(module, LineRange::new(group.start + 1, group.end))?;
        } else {
            rewriter.queue_replace(module, group, new_lines.join("\n"))?;
        }
    }
    Ok(())
}

/// Text of `span` with every rewrite inside it applied.
fn render(text: &str, span: Span, rewrites: &[SlotRewrite], current: Option<usize>) -> String {
    let mut out = String::new();
    let mut pos = span.start;
    for (position, rewrite) in rewrites.iter().enumerate() {
        if Some(position) == current || rewrite.region.start < pos || !span.contains(&rewrite.region) {
            continue;
        }
        out.push_str(&text[pos..rewrite.region.start]);
        out.push_str(&render_rewrite(text, position, rewrites));
        pos = rewrite.region.end;
    }
    out.push_str(&text[pos..span.end]);
    out
}

fn render_rewrite(text: &str, position: usize, rewrites: &[SlotRewrite]) -> String {
    let rewrite = &rewrites[position];
    let (Some(first), Some(last)) = (rewrite.slots.first(), rewrite.slots.last()) else {
        return render(text, rewrite.region, rewrites, Some(position));
    };

    let mut out = render(
        text,
        Span::new(rewrite.region.start, first.start),
        rewrites,
        Some(position),
    );
    for (index, fill) in rewrite.fills.iter().enumerate() {
        if index > 0 {
            match (rewrite.slots.get(index - 1), rewrite.slots.get(index)) {
                (Some(before), Some(after)) => out.push_str(&text[before.end..after.start]),
                _ => out.push_str(", "),
            }
        }
        match fill {
            Fill::Source(span) => out.push_str(&render(text, *span, rewrites, Some(position))),
            Fill::Empty => {}
            Fill::Literal(literal) => out.push_str(literal),
        }
    }
    out.push_str(&render(
        text,
        Span::new(last.end, rewrite.region.end),
        rewrites,
        Some(position),
    ));

    if rewrite.collapse {
        collapse_continuations(&out)
    } else {
        out
    }
}

/// Join ` _` continued lines into one line.
pub(crate) fn collapse_continuations(text: &str) -> String {
    let mut out = String::new();
    let mut continued = false;
    let mut lines = text.split('\n').peekable();
    while let Some(raw) = lines.next() {
        let mut line = raw.strip_suffix('\r').unwrap_or(raw);
        if continued {
            line = line.trim_start();
            if !(out.ends_with('(') || line.starts_with(')') || line.starts_with(',')) {
                out.push(' ');
            }
        }
        let trimmed = line.trim_end();
        let head = trimmed
            .strip_suffix('_')
            .filter(|head| head.is_empty() || head.ends_with(char::is_whitespace));
        match head {
            Some(head) if lines.peek().is_some() => {
                out.push_str(head.trim_end());
                continued = true;
            }
            _ => {
                out.push_str(line);
                continued = false;
                if lines.peek().is_some() {
                    out.push('\n');
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{ModuleId, ModuleKind};

    fn source(text: &str) -> ModuleSource {
        ModuleSource::new(ModuleId::new("P", "M"), ModuleKind::Standard, text)
    }

    fn span_of(text: &str, needle: &str) -> Span {
        let start = text.find(needle).unwrap();
        Span::new(start, start + needle.len())
    }

    #[test]
    fn test_collapse_continuations() {
        assert_eq!(
            collapse_continuations("Sub Foo(ByVal a As Long, _\n        ByVal b As Long)"),
            "Sub Foo(ByVal a As Long, ByVal b As Long)"
        );
        assert_eq!(collapse_continuations("Foo( _\n  a _\n  )"), "Foo(a)");
    }

    #[test]
    fn test_nested_rewrite_is_rendered_inside_moved_slot() {
        let text = "    Foo Bar(1, 2), 3\n";
        let src = source(text);
        let outer_region = span_of(text, "Bar(1, 2), 3");
        let bar_arg = span_of(text, "Bar(1, 2)");
        let three = span_of(text, "3\n");
        let three = Span::new(three.start, three.start + 1);
        let inner_region = span_of(text, "1, 2");
        let one = Span::new(inner_region.start, inner_region.start + 1);
        let two = Span::new(inner_region.end - 1, inner_region.end);

        let rewrites = vec![
            SlotRewrite {
                region: outer_region,
                slots: vec![bar_arg, three],
                fills: vec![Fill::Source(three), Fill::Source(bar_arg)],
                collapse: false,
            },
            SlotRewrite {
                region: inner_region,
                slots: vec![one, two],
                fills: vec![Fill::Source(two), Fill::Source(one)],
                collapse: false,
            },
        ];

        let host = crate::index::ParseSnapshot::new(
            crate::index::DeclarationIndex::default(),
            std::iter::once((
                src.id().clone(),
                crate::index::ParsedModule {
                    source: src.clone(),
                    ast: Default::default(),
                },
            ))
            .collect(),
        );
        let mut rewriter = Rewriter::new(&host);
        queue_slot_rewrites(&mut rewriter, &src, rewrites).unwrap();
        let result = rewriter.commit();
        assert_eq!(result.module_text(src.id()), Some("    Foo 3, Bar(2, 1)\n"));
    }

    #[test]
    fn test_extra_slots_get_default_separator() {
        let text = "Foo 1\n";
        let src = source(text);
        let one = span_of(text, "1");
        let rewrite = SlotRewrite {
            region: one,
            slots: vec![one],
            fills: vec![Fill::Empty, Fill::Source(one)],
            collapse: false,
        };
        assert_eq!(render(text, src.lines_span(1, 1), &[rewrite], None), "Foo , 1");
    }
}
