//! Expected confirmation results for a transaction payload.
//!
//! For every submitted entry the target is expected to report one
//! [`OpResult`] at the same position, carrying the entry's key, the
//! operation, and a FIB-installed status.

use crate::combine::Ordered;
use crate::entry::{Entry, EntryKey};
use crate::error::{Result, ScaleError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Add,
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Add => f.write_str("add"),
            OperationType::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgrammingResult {
    InstalledInRib,
    InstalledInFib,
    Failed,
}

impl fmt::Display for ProgrammingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgrammingResult::InstalledInRib => "RIB_PROGRAMMED",
            ProgrammingResult::InstalledInFib => "FIB_PROGRAMMED",
            ProgrammingResult::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One confirmation: which entry, which operation, and what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpResult {
    pub key: EntryKey,
    pub operation: OperationType,
    pub result: ProgrammingResult,
}

impl OpResult {
    pub fn installed(key: EntryKey, operation: OperationType) -> Self {
        Self {
            key,
            operation,
            result: ProgrammingResult::InstalledInFib,
        }
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operation, self.key, self.result)
    }
}

/// Expected confirmations for installing and withdrawing one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedResults {
    pub adds: Vec<OpResult>,
    pub deletes: Vec<OpResult>,
}

/// Derives expected confirmations from payloads.
pub struct ExpectedResultMirror;

impl ExpectedResultMirror {
    /// Expected results for one operation over `entries`, position for position.
    pub fn results_for(entries: &[Entry], operation: OperationType) -> Vec<OpResult> {
        entries
            .iter()
            .map(|entry| OpResult::installed(entry.key(), operation))
            .collect()
    }

    /// Mirrors an ordered payload: `Add` confirmations in install order and
    /// `Delete` confirmations in teardown order.
    pub fn mirror(payload: &Ordered<Entry>) -> ExpectedResults {
        ExpectedResults {
            adds: Self::results_for(payload.adds(), OperationType::Add),
            deletes: Self::results_for(payload.deletes(), OperationType::Delete),
        }
    }

    /// Compares confirmations position by position.
    pub fn verify(expected: &[OpResult], actual: &[OpResult]) -> Result<()> {
        if expected.len() != actual.len() {
            return Err(ScaleError::ResultCountMismatch {
                expected: expected.len(),
                actual: actual.len(),
            });
        }
        match expected.iter().zip(actual).position(|(e, a)| e != a) {
            Some(position) => Err(ScaleError::ResultMismatch {
                position,
                expected: expected[position],
                actual: actual[position],
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{NextHopAction, NextHopEntry, NextHopGroupEntry, DEFAULT_NETWORK_INSTANCE};
    use pretty_assertions::assert_eq;

    fn payload() -> Ordered<Entry> {
        Ordered::from_adds(vec![
            NextHopEntry::new(1, DEFAULT_NETWORK_INSTANCE, NextHopAction::Decap).into(),
            NextHopGroupEntry::new(2, DEFAULT_NETWORK_INSTANCE)
                .with_next_hop(1, 1)
                .into(),
        ])
    }

    #[test]
    fn test_mirror_matches_positions() {
        let mirrored = ExpectedResultMirror::mirror(&payload());
        assert_eq!(
            mirrored.adds,
            vec![
                OpResult::installed(EntryKey::NextHop(1), OperationType::Add),
                OpResult::installed(EntryKey::NextHopGroup(2), OperationType::Add),
            ]
        );
        assert_eq!(mirrored.adds[1].to_string(), "add NHG 2 FIB_PROGRAMMED");
    }

    #[test]
    fn test_mirror_deletes_in_teardown_order() {
        let mirrored = ExpectedResultMirror::mirror(&payload());
        let keys: Vec<EntryKey> = mirrored.deletes.iter().map(|r| r.key).collect();
        let mut add_keys: Vec<EntryKey> = mirrored.adds.iter().map(|r| r.key).collect();
        add_keys.reverse();
        assert_eq!(keys, add_keys);
        assert!(mirrored.deletes.iter().all(|r| r.operation == OperationType::Delete));
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let expected = ExpectedResultMirror::mirror(&payload()).adds;
        assert!(ExpectedResultMirror::verify(&expected, &expected).is_ok());

        let mut actual = expected.clone();
        actual[1].result = ProgrammingResult::Failed;
        assert!(matches!(
            ExpectedResultMirror::verify(&expected, &actual),
            Err(ScaleError::ResultMismatch { position: 1, .. })
        ));
        assert!(matches!(
            ExpectedResultMirror::verify(&expected, &actual[..1]),
            Err(ScaleError::ResultCountMismatch { expected: 2, actual: 1 })
        ));
    }
}
