//! Line-level unified diffs between a snapshot and new events.

use std::fmt::Write as _;

/// Unchanged lines shown around each change.
pub const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    tag: Tag,
    /// Position in the old sequence before this op
    old: usize,
    /// Position in the new sequence before this op
    new: usize,
}

/// Edit script from `old` to `new` along a longest common subsequence.
fn edit_script(old: &[String], new: &[String]) -> Vec<Op> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        let tag = if i < n && j < m && old[i] == new[j] {
            Tag::Equal
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            Tag::Delete
        } else {
            Tag::Insert
        };
        ops.push(Op { tag, old: i, new: j });
        match tag {
            Tag::Equal => {
                i += 1;
                j += 1;
            }
            Tag::Delete => i += 1,
            Tag::Insert => j += 1,
        }
    }
    ops
}

/// Render a unified diff, or `None` when the sequences are equal.
pub fn unified_diff(old: &[String], new: &[String], old_label: &str, new_label: &str) -> Option<String> {
    if old == new {
        return None;
    }

    let ops = edit_script(old, new);
    let mut out = String::new();
    writeln!(out, "--- {}", old_label).unwrap();
    writeln!(out, "+++ {}", new_label).unwrap();

    for (start, end) in hunks(&ops) {
        let slice = &ops[start..end];
        let old_len = slice.iter().filter(|op| op.tag != Tag::Insert).count();
        let new_len = slice.iter().filter(|op| op.tag != Tag::Delete).count();
        writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            hunk_start(slice[0].old, old_len),
            old_len,
            hunk_start(slice[0].new, new_len),
            new_len
        )
        .unwrap();

        for op in slice {
            match op.tag {
                Tag::Equal => writeln!(out, " {}", old[op.old]).unwrap(),
                Tag::Delete => writeln!(out, "-{}", old[op.old]).unwrap(),
                Tag::Insert => writeln!(out, "+{}", new[op.new]).unwrap(),
            }
        }
    }

    Some(out)
}

/// Op ranges `[start, end)` covering every change plus context.
fn hunks(ops: &[Op]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, op) in ops.iter().enumerate() {
        if op.tag == Tag::Equal {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT);
        let end = (idx + 1 + CONTEXT).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// 1-based hunk start; an empty side points at the line before it.
fn hunk_start(pos: usize, len: usize) -> usize {
    if len == 0 {
        pos
    } else {
        pos + 1
    }
}
