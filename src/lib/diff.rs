// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use crate::Statement;

/// Statement level difference between what the device holds and what
/// would be applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct StatementDiff {
    /// Statements found on device but absent from the desired ones.
    pub removed: Vec<Statement>,
    /// Desired statements not found on device.
    pub added: Vec<Statement>,
    /// Same statements but a different order, which matters for ordered
    /// lists.
    pub reordered: bool,
}

impl StatementDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && !self.reordered
    }
}

impl std::fmt::Display for StatementDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in self.removed.as_slice() {
            writeln!(f, "- {statement}")?;
        }
        for statement in self.added.as_slice() {
            writeln!(f, "+ {statement}")?;
        }
        if self.reordered {
            writeln!(f, "~ order of statements changed")?;
        }
        Ok(())
    }
}

pub fn gen_diff(current: &[Statement], desired: &[Statement]) -> StatementDiff {
    let cur_set: HashSet<&Statement> = current.iter().collect();
    let des_set: HashSet<&Statement> = desired.iter().collect();

    let removed: Vec<Statement> = current
        .iter()
        .filter(|s| !des_set.contains(s))
        .cloned()
        .collect();
    let added: Vec<Statement> = desired
        .iter()
        .filter(|s| !cur_set.contains(s))
        .cloned()
        .collect();
    let reordered =
        removed.is_empty() && added.is_empty() && current != desired;

    StatementDiff {
        removed,
        added,
        reordered,
    }
}
