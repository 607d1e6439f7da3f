//! Line-based text diff over a longest-common-subsequence table.

use serde::{Deserialize, Serialize};

/// One step of an edit script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "line", rename_all = "lowercase")]
pub enum DiffOp {
    /// Line present on both sides
    Equal(String),
    /// Line only in the old text
    Delete(String),
    /// Line only in the new text
    Insert(String),
}

/// Edit script between two texts plus its annotated rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDiff {
    /// Edit script, old-to-new
    pub ops: Vec<DiffOp>,
    /// `"  "`, `"- "`, `"+ "` prefixed lines joined with newlines
    pub rendered: String,
}

impl TextDiff {
    /// Number of inserted lines
    pub fn insertions(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DiffOp::Insert(_))).count()
    }

    /// Number of deleted lines
    pub fn deletions(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DiffOp::Delete(_))).count()
    }
}

/// Diff `old` against `new` line by line
pub fn diff_lines(old: &str, new: &str) -> TextDiff {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let ops = lcs_script(&a, &b);
    let rendered = ops
        .iter()
        .map(|op| match op {
            DiffOp::Equal(line) => format!("  {}", line),
            DiffOp::Delete(line) => format!("- {}", line),
            DiffOp::Insert(line) => format!("+ {}", line),
        })
        .collect::<Vec<_>>()
        .join("\n");
    TextDiff { ops, rendered }
}

fn lcs_script(a: &[&str], b: &[&str]) -> Vec<DiffOp> {
    let (n, m) = (a.len(), b.len());
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(DiffOp::Equal(a[i].to_string()));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            ops.push(DiffOp::Delete(a[i].to_string()));
            i += 1;
        } else {
            ops.push(DiffOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    ops.extend(a[i..].iter().map(|line| DiffOp::Delete(line.to_string())));
    ops.extend(b[j..].iter().map(|line| DiffOp::Insert(line.to_string())));
    ops
}
