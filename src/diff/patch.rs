//! Unified patch rendering for change sets.

use std::fmt::Write;

use super::{split_lines, Change, ChangeKind};

/// Default number of context lines around each hunk.
pub const DEFAULT_CONTEXT: usize = 3;

struct Line<'a> {
    kind: ChangeKind,
    text: &'a str,
}

/// Render a change set as a unified patch.
///
/// Identical inputs produce only the `---`/`+++` header lines.
pub fn render_unified(
    changes: &[Change],
    from_label: &str,
    to_label: &str,
    context: usize,
) -> String {
    let lines: Vec<Line<'_>> = changes
        .iter()
        .flat_map(|change| {
            split_lines(&change.text)
                .into_iter()
                .map(move |text| Line { kind: change.kind, text })
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "--- {}", from_label);
    let _ = writeln!(out, "+++ {}", to_label);

    for (start, end) in hunk_ranges(&lines, context) {
        render_hunk(&mut out, &lines, start, end);
    }
    out
}

/// Group changed lines into `[start, end)` ranges over `lines`, each padded
/// with up to `context` unchanged lines. Ranges closer than `2 * context`
/// are merged.
fn hunk_ranges(lines: &[Line<'_>], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.kind == ChangeKind::Unchanged {
            continue;
        }
        let start = i.saturating_sub(context);
        let end = (i + 1 + context).min(lines.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

fn render_hunk(out: &mut String, lines: &[Line<'_>], start: usize, end: usize) {
    let (old_before, new_before) = lines[..start].iter().fold((0, 0), |(old, new), line| {
        match line.kind {
            ChangeKind::Unchanged => (old + 1, new + 1),
            ChangeKind::Removed => (old + 1, new),
            ChangeKind::Added => (old, new + 1),
        }
    });

    let hunk = &lines[start..end];
    let old_count = hunk.iter().filter(|l| l.kind != ChangeKind::Added).count();
    let new_count = hunk.iter().filter(|l| l.kind != ChangeKind::Removed).count();

    let old_start = if old_count == 0 { old_before } else { old_before + 1 };
    let new_start = if new_count == 0 { new_before } else { new_before + 1 };

    let _ = writeln!(
        out,
        "@@ -{},{} +{},{} @@",
        old_start, old_count, new_start, new_count
    );

    for line in hunk {
        let prefix = match line.kind {
            ChangeKind::Unchanged => ' ',
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        };
        out.push(prefix);
        match line.text.strip_suffix('\n') {
            Some(body) => {
                out.push_str(body);
                out.push('\n');
            }
            None => {
                out.push_str(line.text);
                out.push_str("\n\\ No newline at end of file\n");
            }
        }
    }
}
