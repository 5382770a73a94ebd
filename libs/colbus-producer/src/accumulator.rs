use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, oneshot};
use tokio::time::Instant;

use colbus_api::{BackendError, ProduceResponse, RecordMetadata, WireRecord};

use crate::error::ProducerError;

pub(crate) type Callback = Box<dyn FnOnce(Result<RecordMetadata, ProducerError>) + Send>;

/// Where a record's outcome goes.
pub(crate) enum Completion {
    Future(oneshot::Sender<Result<RecordMetadata, ProducerError>>),
    /// Runs on the dispatch task, before the batch counts as done.
    Callback(Callback),
}

impl Completion {
    fn complete(self, outcome: Result<RecordMetadata, ProducerError>) {
        match self {
            // Receiver gone means the caller dropped its future; nothing to report to.
            Completion::Future(tx) => {
                let _ = tx.send(outcome);
            }
            Completion::Callback(callback) => callback(outcome),
        }
    }
}

/// A serialized record waiting for its batch to be sent.
pub(crate) struct PendingRecord {
    pub topic: String,
    pub partition: u32,
    pub record: WireRecord,
    pub serialized_key_size: Option<usize>,
    pub completion: Completion,
    /// Buffer space held until the record completes.
    pub permit: OwnedSemaphorePermit,
}

// ═══════════════════════════════════════════════════════════════
//  Batch
// ═══════════════════════════════════════════════════════════════

/// Records for one partition, sent in one produce request.
pub(crate) struct Batch {
    pub topic: String,
    pub partition: u32,
    records: Vec<PendingRecord>,
    bytes: usize,
    created: Instant,
}

impl Batch {
    fn new(topic: String, partition: u32) -> Self {
        Self { topic, partition, records: Vec::new(), bytes: 0, created: Instant::now() }
    }

    fn push(&mut self, pending: PendingRecord) {
        self.bytes += pending.record.size();
        self.records.push(pending);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn wire_records(&self) -> Vec<WireRecord> {
        self.records.iter().map(|p| p.record.clone()).collect()
    }

    /// Resolve every record of the batch. Offsets are assigned in batch order
    /// from the response's base offset.
    pub fn complete(self, result: Result<ProduceResponse, BackendError>) {
        let Batch { topic, partition, records, .. } = self;
        for (i, pending) in records.into_iter().enumerate() {
            let outcome = match &result {
                Ok(resp) => Ok(RecordMetadata {
                    topic: topic.clone(),
                    partition,
                    offset: resp.base_offset.map(|base| base + i as u64),
                    timestamp_ms: pending.record.timestamp_ms,
                    serialized_key_size: pending.serialized_key_size,
                    serialized_value_size: pending.record.value.len(),
                }),
                Err(e) => Err(ProducerError::Send {
                    topic: topic.clone(),
                    partition,
                    source: e.clone(),
                }),
            };
            drop(pending.permit);
            pending.completion.complete(outcome);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Accumulator
// ═══════════════════════════════════════════════════════════════

/// Open batches per (topic, partition). Decides when a batch is ready:
/// when it reaches `batch_size` bytes or has waited `linger`.
pub(crate) struct Accumulator {
    batch_size: usize,
    linger: Duration,
    open: HashMap<(String, u32), Batch>,
}

impl Accumulator {
    pub fn new(batch_size: usize, linger: Duration) -> Self {
        Self { batch_size, linger, open: HashMap::new() }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Add a record; returns batches that became ready.
    pub fn append(&mut self, pending: PendingRecord) -> Vec<Batch> {
        let mut ready = Vec::new();
        let key = (pending.topic.clone(), pending.partition);
        let size = pending.record.size();

        let overflows = self
            .open
            .get(&key)
            .is_some_and(|b| !b.records.is_empty() && b.bytes + size > self.batch_size);
        if overflows {
            ready.extend(self.open.remove(&key));
        }

        let batch = self
            .open
            .entry(key.clone())
            .or_insert_with(|| Batch::new(pending.topic.clone(), pending.partition));
        batch.push(pending);
        let full = batch.bytes >= self.batch_size;

        if full {
            ready.extend(self.open.remove(&key));
        }
        ready
    }

    /// Earliest moment an open batch runs out of linger time.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.open.values().map(|b| b.created + self.linger).min()
    }

    pub fn drain_expired(&mut self, now: Instant) -> Vec<Batch> {
        let expired: Vec<_> = self
            .open
            .iter()
            .filter(|(_, b)| b.created + self.linger <= now)
            .map(|(k, _)| k.clone())
            .collect();
        expired.into_iter().filter_map(|k| self.open.remove(&k)).collect()
    }

    pub fn drain_all(&mut self) -> Vec<Batch> {
        self.open.drain().map(|(_, b)| b).collect()
    }
}
