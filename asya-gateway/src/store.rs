//! The envelope store: the only mutable global state in the gateway.
//!
//! Backed by a `DashMap` keyed by envelope id, with a `parking_lot::Mutex`
//! guarding each record as the "single writer lock" (teacher precedent:
//! §5 "no I/O under lock" — every method here is pure bookkeeping, all
//! network I/O happens above this layer).

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use asya_core::{Envelope, EnvelopeStatus};

use crate::error::{GatewayError, GatewayResult};

/// One observed change to an envelope: a full snapshot plus a monotonic
/// per-envelope sequence number, so `GetUpdates(id, since)` can slice the
/// log without ambiguity.
#[derive(Debug, Clone)]
pub struct EnvelopeUpdate {
    pub seq: u64,
    pub envelope: Envelope,
}

struct EnvelopeRecord {
    envelope: Envelope,
    updates: Vec<EnvelopeUpdate>,
    subscribers: Vec<mpsc::Sender<EnvelopeUpdate>>,
    next_seq: u64,
}

impl EnvelopeRecord {
    fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            updates: Vec::new(),
            subscribers: Vec::new(),
            next_seq: 0,
        }
    }

    /// Records the current envelope state as an update and fans it out to
    /// subscribers, dropping it for anyone whose buffer is full. Terminal
    /// updates close every subscriber channel after delivery.
    fn publish(&mut self) {
        let update = EnvelopeUpdate {
            seq: self.next_seq,
            envelope: self.envelope.clone(),
        };
        self.next_seq += 1;
        self.updates.push(update.clone());

        self.subscribers.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if self.envelope.status.is_terminal() {
            self.subscribers.clear();
        }
    }
}

/// Maps envelope id to its current state, update log, and live subscribers.
pub struct EnvelopeStore {
    records: DashMap<String, Mutex<EnvelopeRecord>>,
    subscriber_capacity: usize,
}

impl EnvelopeStore {
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            records: DashMap::new(),
            subscriber_capacity,
        }
    }

    /// Validates an id is non-empty and contains no `/`, per the path
    /// pattern `/envelopes/<non-empty id without '/'>`.
    pub fn validate_id(id: &str) -> GatewayResult<()> {
        if id.is_empty() || id.contains('/') {
            return Err(GatewayError::InvalidEnvelopeId);
        }
        Ok(())
    }

    pub fn create(&self, envelope: Envelope) -> GatewayResult<()> {
        Self::validate_id(&envelope.id)?;
        if self.records.contains_key(&envelope.id) {
            return Err(GatewayError::AlreadyExists { id: envelope.id });
        }
        self.records
            .insert(envelope.id.clone(), Mutex::new(EnvelopeRecord::new(envelope)));
        Ok(())
    }

    pub fn get(&self, id: &str) -> GatewayResult<Envelope> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        Ok(record.lock().envelope.clone())
    }

    pub fn is_active(&self, id: &str) -> GatewayResult<bool> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        Ok(record.lock().envelope.is_active())
    }

    pub fn delete(&self, id: &str) -> GatewayResult<()> {
        Self::validate_id(id)?;
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })
    }

    /// Applies a progress report: authoritatively sets `route.current` to
    /// `current_actor_idx`, extends the tail with `reported_actors` (empty
    /// falls back to the stored route), and recomputes `progress_percent`,
    /// clamped to never regress.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_progress(
        &self,
        id: &str,
        reported_actors: &[String],
        current_actor_idx: usize,
        step: u32,
        message: Option<String>,
    ) -> GatewayResult<Envelope> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        let mut record = record.lock();

        if !reported_actors.is_empty() {
            if reported_actors.len() < current_actor_idx + 1 {
                return Err(GatewayError::invalid_progress_actors(
                    reported_actors.len(),
                    current_actor_idx,
                ));
            }
            record.envelope.route.current = current_actor_idx;
            record.envelope.route.apply_reported_actors(reported_actors)?;
        }

        record.envelope.current_actor_name = record
            .envelope
            .route
            .current_actor_name()
            .map(str::to_string);
        let route_len = record.envelope.route.actors.len();
        let computed = crate::progress::compute_progress_percent(route_len, current_actor_idx, step);
        record.envelope.progress_percent = computed.max(record.envelope.progress_percent);
        if let Some(message) = message {
            record.envelope.progress_message = Some(message);
        }
        record.envelope.updated_at = chrono::Utc::now();

        record.publish();
        Ok(record.envelope.clone())
    }

    /// Applies a terminal outcome. Idempotent: if the envelope is already
    /// terminal, this is a no-op that still returns the current snapshot.
    pub fn apply_final(
        &self,
        id: &str,
        result: Option<Value>,
        error: Option<String>,
    ) -> GatewayResult<Envelope> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        let mut record = record.lock();

        if record.envelope.status.is_active() {
            match error {
                Some(error) => {
                    let _ = record.envelope.mark_failed(error);
                }
                None => {
                    let _ = record.envelope.mark_succeeded(result.unwrap_or(Value::Null));
                }
            }
            record.publish();
        }
        Ok(record.envelope.clone())
    }

    pub fn subscribe(&self, id: &str) -> GatewayResult<mpsc::Receiver<EnvelopeUpdate>> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        let mut record = record.lock();
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        if record.envelope.status.is_terminal() {
            // Deliver the terminal state once, then close immediately.
            let _ = tx.try_send(EnvelopeUpdate {
                seq: record.next_seq,
                envelope: record.envelope.clone(),
            });
        } else {
            record.subscribers.push(tx);
        }
        Ok(rx)
    }

    pub fn get_updates(&self, id: &str, since: Option<u64>) -> GatewayResult<Vec<EnvelopeUpdate>> {
        Self::validate_id(id)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
        let record = record.lock();
        let updates = match since {
            Some(since) => record
                .updates
                .iter()
                .filter(|update| update.seq > since)
                .cloned()
                .collect(),
            None => record.updates.clone(),
        };
        Ok(updates)
    }
}

pub type SharedEnvelopeStore = Arc<EnvelopeStore>;
