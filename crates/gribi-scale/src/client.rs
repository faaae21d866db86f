//! RIB transaction client boundary.
//!
//! The generator never speaks the programming protocol itself. Anything that
//! can submit entries and wait for their confirmation implements
//! [`RibClient`]; session setup and leadership election happen before the
//! client is handed over.

use crate::entry::Entry;
use crate::expected::{ExpectedResultMirror, OpResult, OperationType};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a RIB client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

/// Capability to program entries on the device under test.
#[async_trait]
pub trait RibClient: Send + Sync {
    /// Submits `entries` for installation, optionally with the per-entry
    /// confirmations the caller expects.
    async fn add_entries(
        &self,
        entries: &[Entry],
        expected: Option<&[OpResult]>,
    ) -> Result<(), ClientError>;

    /// Submits `entries` for withdrawal.
    async fn delete_entries(
        &self,
        entries: &[Entry],
        expected: Option<&[OpResult]>,
    ) -> Result<(), ClientError>;

    /// Waits until every outstanding operation is confirmed or `timeout` elapses.
    async fn await_completion(&self, timeout: Duration) -> Result<(), ClientError>;
}

/// One submitted transaction as seen by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedTransaction {
    pub operation: OperationType,
    pub entries: Vec<Entry>,
    pub expected: Option<Vec<OpResult>>,
}

#[derive(Debug, Default)]
struct Recording {
    transactions: Vec<RecordedTransaction>,
    results: Vec<OpResult>,
    awaits: usize,
}

/// In-memory client that accepts everything.
///
/// Every submitted entry is confirmed as installed in the FIB, in submission
/// order.
#[derive(Debug, Default)]
pub struct RecordingClient {
    inner: Mutex<Recording>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, operation: OperationType, entries: &[Entry], expected: Option<&[OpResult]>) {
        let mut inner = self.inner.lock();
        inner
            .results
            .extend(ExpectedResultMirror::results_for(entries, operation));
        inner.transactions.push(RecordedTransaction {
            operation,
            entries: entries.to_vec(),
            expected: expected.map(<[OpResult]>::to_vec),
        });
        debug!("recorded {} of {} entries", operation, entries.len());
    }

    pub fn transactions(&self) -> Vec<RecordedTransaction> {
        self.inner.lock().transactions.clone()
    }

    /// All confirmations produced so far.
    pub fn results(&self) -> Vec<OpResult> {
        self.inner.lock().results.clone()
    }

    /// Confirmations produced since `start` (an earlier `results().len()`).
    pub fn results_since(&self, start: usize) -> Vec<OpResult> {
        let inner = self.inner.lock();
        inner.results.get(start..).map(<[OpResult]>::to_vec).unwrap_or_default()
    }

    pub fn result_count(&self) -> usize {
        self.inner.lock().results.len()
    }

    pub fn await_count(&self) -> usize {
        self.inner.lock().awaits
    }

    pub fn clear(&self) {
        *self.inner.lock() = Recording::default();
    }
}

#[async_trait]
impl RibClient for RecordingClient {
    async fn add_entries(
        &self,
        entries: &[Entry],
        expected: Option<&[OpResult]>,
    ) -> Result<(), ClientError> {
        self.record(OperationType::Add, entries, expected);
        Ok(())
    }

    async fn delete_entries(
        &self,
        entries: &[Entry],
        expected: Option<&[OpResult]>,
    ) -> Result<(), ClientError> {
        self.record(OperationType::Delete, entries, expected);
        Ok(())
    }

    async fn await_completion(&self, _timeout: Duration) -> Result<(), ClientError> {
        self.inner.lock().awaits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKey, NextHopAction, NextHopEntry, DEFAULT_NETWORK_INSTANCE};
    use pretty_assertions::assert_eq;

    fn entries() -> Vec<Entry> {
        (1..=3)
            .map(|i| NextHopEntry::new(i, DEFAULT_NETWORK_INSTANCE, NextHopAction::Decap).into())
            .collect()
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::Timeout(Duration::from_secs(600)).to_string(),
            "timed out after 600s"
        );
        assert_eq!(
            ClientError::Rejected("NHG 5 missing".to_string()).to_string(),
            "rejected: NHG 5 missing"
        );
    }

    #[tokio::test]
    async fn test_recording_client_confirms_in_order() {
        let client = RecordingClient::new();
        let entries = entries();

        client.add_entries(&entries, None).await.unwrap();
        client.delete_entries(&entries[..1], None).await.unwrap();
        client.await_completion(Duration::from_secs(1)).await.unwrap();

        let results = client.results();
        assert_eq!(results.len(), 4);
        assert_eq!(results[2].key, EntryKey::NextHop(3));
        assert_eq!(results[3].operation, OperationType::Delete);
        assert_eq!(client.results_since(3).len(), 1);
        assert_eq!(client.transactions().len(), 2);
        assert_eq!(client.await_count(), 1);

        client.clear();
        assert_eq!(client.result_count(), 0);
    }

    #[tokio::test]
    async fn test_recording_client_keeps_expectations() {
        let client = RecordingClient::new();
        let entries = entries();
        let expected = ExpectedResultMirror::results_for(&entries, OperationType::Add);

        client.add_entries(&entries, Some(&expected)).await.unwrap();
        assert_eq!(client.transactions()[0].expected.as_deref(), Some(expected.as_slice()));
    }
}
