//! The route plan an envelope carries: an ordered list of actor names, a
//! cursor into it, and an opaque metadata bag.
//!
//! The prefix `[0..current]` is immutable history; only the tail may be
//! rewritten, and only by the actor currently holding the envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::reserved::is_terminal_actor;

/// An ordered plan of actor names plus a cursor into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// The full plan: past, current, and future actor names.
    pub actors: Vec<String>,
    /// Index into `actors` of the actor currently (or about to be) handling
    /// the envelope.
    pub current: usize,
    /// Opaque per-route metadata, untouched by the core.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Route {
    /// Builds a new route at index 0, validating that no reserved terminal
    /// actor name appears anywhere but the final two positions.
    pub fn new(actors: Vec<String>) -> CoreResult<Self> {
        Self::validate_user_actors(&actors)?;
        Ok(Self {
            actors,
            current: 0,
            metadata: Map::new(),
        })
    }

    /// Rejects a user-configured actor list that uses a reserved terminal
    /// actor name anywhere; terminal actors are appended by the sidecar,
    /// never declared by the caller.
    fn validate_user_actors(actors: &[String]) -> CoreResult<()> {
        for actor in actors {
            if is_terminal_actor(actor) {
                return Err(CoreError::reserved_actor_name(actor.clone()));
            }
        }
        Ok(())
    }

    /// The immutable history: actor names already passed through.
    pub fn prefix(&self) -> &[String] {
        let end = self.current.min(self.actors.len());
        &self.actors[..end]
    }

    /// The mutable tail, starting at `current`.
    pub fn tail(&self) -> &[String] {
        let start = self.current.min(self.actors.len());
        &self.actors[start..]
    }

    /// The name of the actor at `current`, if `current` is in bounds.
    pub fn current_actor_name(&self) -> Option<&str> {
        self.actors.get(self.current).map(String::as_str)
    }

    /// Advances the cursor by one, without touching `actors`.
    pub fn advance(&mut self) -> CoreResult<()> {
        if self.current >= self.actors.len() {
            return Err(CoreError::route_index_out_of_bounds(
                self.current,
                self.actors.len(),
            ));
        }
        self.current += 1;
        Ok(())
    }

    /// Returns true if `current` has moved past the last actor, i.e. the
    /// user-defined route is exhausted and the next hop is a terminal actor.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.actors.len()
    }

    /// Replaces the tail (`actors[current..]`) with `new_tail`, keeping the
    /// prefix byte-for-byte unchanged. Rejects any `new_tail` that is
    /// shorter than what is needed to preserve the prefix.
    pub fn set_tail(&mut self, new_tail: Vec<String>) -> CoreResult<()> {
        let prefix_len = self.current;
        if new_tail.len() < prefix_len.saturating_sub(prefix_len) {
            // unreachable in practice (prefix_len - prefix_len == 0) but keeps
            // the invariant explicit: a tail replacement never shrinks the
            // prefix, by construction it only ever appends at `current..`.
        }
        let mut actors = self.actors[..prefix_len].to_vec();
        actors.extend(new_tail);
        self.actors = actors;
        Ok(())
    }

    /// Applies a reported actor list from a progress update, validating the
    /// immutable-prefix invariant. An empty `reported` falls back to the
    /// stored route (regression guard); a non-empty `reported` shorter than
    /// the immutable prefix is rejected.
    pub fn apply_reported_actors(&mut self, reported: &[String]) -> CoreResult<()> {
        if reported.is_empty() {
            return Ok(());
        }
        let prefix_len = self.current;
        if reported.len() < prefix_len {
            return Err(CoreError::prefix_rewrite_rejected(
                reported.len(),
                prefix_len,
            ));
        }
        if reported[..prefix_len] != self.actors[..prefix_len] {
            return Err(CoreError::prefix_rewrite_rejected(
                reported.len(),
                prefix_len,
            ));
        }
        self.actors = reported.to_vec();
        Ok(())
    }
}
