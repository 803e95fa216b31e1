use std::collections::HashMap;
use std::sync::RwLock;

use storeops_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StreamAppend, StoredEvent, validate_batch};

#[derive(Debug, Default)]
struct Streams {
    by_id: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Stream creation order, for listing.
    created: Vec<(String, AggregateId)>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. The write lock is held only for the version checks
/// and the append itself.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|s| !s.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&batch)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        // Check every stream before touching any of them.
        for entry in &batch {
            let stream = streams
                .by_id
                .get(&entry.aggregate_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let current = Self::current_version(stream);

            if !entry.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    entry.aggregate_id, entry.expected_version
                )));
            }

            // Enforce aggregate type stability across the stream.
            if let Some(existing) = stream.first() {
                if existing.aggregate_type != entry.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, entry.aggregate_type
                    )));
                }
            }
        }

        let mut committed = Vec::new();
        for entry in batch {
            let is_new = !streams.by_id.contains_key(&entry.aggregate_id);
            if is_new {
                streams
                    .created
                    .push((entry.aggregate_type.clone(), entry.aggregate_id));
            }

            let stream = streams.by_id.entry(entry.aggregate_id).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in entry.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.by_id.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn stream_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams
            .created
            .iter()
            .filter(|(t, _)| t == aggregate_type)
            .map(|(_, id)| *id)
            .collect())
    }
}
