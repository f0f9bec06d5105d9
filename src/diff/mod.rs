//! Line-level diff engine.
//!
//! Computes an ordered change set between two texts with Myers' O(ND)
//! shortest edit script over lines. Lines keep their terminators, so the
//! change set reproduces both inputs exactly:
//!
//! - `unchanged` + `added` blocks concatenate to the new text
//! - `unchanged` + `removed` blocks concatenate to the old text
//!
//! Everything here is pure and allocation-only; it is safe to call from any
//! number of tasks without synchronisation.

pub mod patch;

pub use patch::render_unified;

use serde::{Deserialize, Serialize};

/// Edit distances above this bound stop the search; the remaining middle
/// region is reported as a single removal followed by a single addition.
pub const MAX_EDIT_DISTANCE: usize = 2048;

/// The kind of a change block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Unchanged,
    Added,
    Removed,
}

/// A contiguous block of lines sharing one change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ChangeKind,
    pub text: String,
    pub line_count: usize,
}

/// Aggregate line counts of a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    pub fn from_changes(changes: &[Change]) -> Self {
        changes.iter().fold(Self::default(), |mut acc, change| {
            match change.kind {
                ChangeKind::Added => acc.additions += change.line_count,
                ChangeKind::Removed => acc.deletions += change.line_count,
                ChangeKind::Unchanged => {}
            }
            acc
        })
    }

    pub fn is_identical(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }
}

/// Split text into lines, keeping each line's terminator.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Compute the line-level change set turning `from` into `to`.
pub fn diff_lines(from: &str, to: &str) -> Vec<Change> {
    let a = split_lines(from);
    let b = split_lines(to);
    let edits = edit_script(&a, &b);

    let mut changes: Vec<Change> = Vec::new();
    for edit in edits {
        let (kind, line) = match edit {
            Edit::Equal(i) => (ChangeKind::Unchanged, a[i]),
            Edit::Delete(i) => (ChangeKind::Removed, a[i]),
            Edit::Insert(j) => (ChangeKind::Added, b[j]),
        };
        match changes.last_mut() {
            Some(last) if last.kind == kind => {
                last.text.push_str(line);
                last.line_count += 1;
            }
            _ => changes.push(Change {
                kind,
                text: line.to_string(),
                line_count: 1,
            }),
        }
    }
    changes
}

/// Convenience wrapper returning the change set and its summary.
pub fn diff_with_summary(from: &str, to: &str) -> (Vec<Change>, DiffSummary) {
    let changes = diff_lines(from, to);
    let summary = DiffSummary::from_changes(&changes);
    (changes, summary)
}

// ---------------------------------------------------------------------------
// Myers shortest edit script
// ---------------------------------------------------------------------------

/// One step of an edit script, indexing into the old (`a`) or new (`b`) lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

fn edit_script(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut edits: Vec<Edit> = (0..prefix).map(Edit::Equal).collect();

    let middle = myers(a_mid, b_mid).unwrap_or_else(|| {
        let mut replace: Vec<Edit> = (0..a_mid.len()).map(Edit::Delete).collect();
        replace.extend((0..b_mid.len()).map(Edit::Insert));
        replace
    });

    edits.extend(middle.into_iter().map(|edit| match edit {
        Edit::Equal(i) => Edit::Equal(i + prefix),
        Edit::Delete(i) => Edit::Delete(i + prefix),
        Edit::Insert(j) => Edit::Insert(j + prefix),
    }));

    edits.extend((a.len() - suffix..a.len()).map(Edit::Equal));
    edits
}

/// Myers' forward search with a per-round snapshot of the frontier, then a
/// backtrack over the snapshots. Returns `None` when the edit distance
/// exceeds [`MAX_EDIT_DISTANCE`].
///
/// Equal runs are emitted as `Equal` indices into `a`.
fn myers(a: &[&str], b: &[&str]) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 && m == 0 {
        return Some(Vec::new());
    }

    let max = (n + m) as usize;
    let bound = max.min(MAX_EDIT_DISTANCE) as isize;
    let offset = max as isize;
    let mut v = vec![0isize; 2 * max + 2];
    // trace[d] holds v[-d..=d] as it was at the start of round d.
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut found = false;

    for d in 0..=bound {
        trace.push(v[(offset - d) as usize..=(offset + d) as usize].to_vec());

        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                found = true;
                break;
            }
            k += 2;
        }
        if found {
            break;
        }
    }

    if !found {
        return None;
    }

    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);

    for (d, row) in trace.iter().enumerate().rev() {
        let d = d as isize;
        if d == 0 {
            while x > 0 && y > 0 {
                x -= 1;
                y -= 1;
                edits.push(Edit::Equal(x as usize));
            }
            break;
        }

        let at = |k: isize| row[(k + d) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Equal(x as usize));
        }

        if x == prev_x {
            edits.push(Edit::Insert(prev_y as usize));
        } else {
            edits.push(Edit::Delete(prev_x as usize));
        }
        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    Some(order_replacements(edits))
}

/// Within every run of consecutive non-equal edits, move deletions ahead of
/// insertions so a replaced region always reads "removed, then added".
fn order_replacements(edits: Vec<Edit>) -> Vec<Edit> {
    let mut ordered = Vec::with_capacity(edits.len());
    let mut deletes = Vec::new();
    let mut inserts = Vec::new();

    for edit in edits {
        match edit {
            Edit::Delete(_) => deletes.push(edit),
            Edit::Insert(_) => inserts.push(edit),
            Edit::Equal(_) => {
                ordered.append(&mut deletes);
                ordered.append(&mut inserts);
                ordered.push(edit);
            }
        }
    }
    ordered.append(&mut deletes);
    ordered.append(&mut inserts);
    ordered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
