//! Fan-out child-id minting: pure functions kept free of any I/O so the
//! algorithm itself stays exhaustively unit-testable.

use asya_core::{Envelope, Route};
use serde_json::Value;

/// Mints `n` child ids from `parent_id`: `{parent_id}-1 .. {parent_id}-n`.
pub fn mint_child_ids(parent_id: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{parent_id}-{i}")).collect()
}

/// Builds the child envelopes for a fan-out response.
///
/// The first response reuses `parent_id` unchanged (it is not a new
/// child); every response after it gets a minted id from
/// [`mint_child_ids`] and inherits `parent_id` as its own `parent_id`.
/// Each child's `route` and `payload` come from its own response value,
/// which may diverge from the parent's route tail.
pub fn build_fanout_envelopes(
    parent_id: &str,
    responses: Vec<(Route, Value)>,
) -> Vec<Envelope> {
    let child_ids = mint_child_ids(parent_id, responses.len().saturating_sub(1));
    responses
        .into_iter()
        .enumerate()
        .map(|(i, (route, payload))| {
            if i == 0 {
                Envelope::new(parent_id, route, payload)
            } else {
                Envelope::new(child_ids[i - 1].clone(), route, payload)
                    .with_parent_id(parent_id)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route::new(vec!["next".into()]).unwrap()
    }

    #[test]
    fn mint_child_ids_produces_one_indexed_suffixes() {
        assert_eq!(
            mint_child_ids("env-1", 3),
            vec!["env-1-1", "env-1-2", "env-1-3"]
        );
    }

    #[test]
    fn mint_child_ids_is_empty_for_zero() {
        assert!(mint_child_ids("env-1", 0).is_empty());
    }

    #[test]
    fn single_response_reuses_the_parent_id() {
        let envelopes =
            build_fanout_envelopes("env-1", vec![(route(), serde_json::json!({"a": 1}))]);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].id, "env-1");
        assert!(envelopes[0].parent_id.is_none());
    }

    #[test]
    fn multi_response_mints_children_and_preserves_parent_id_first() {
        let envelopes = build_fanout_envelopes(
            "env-1",
            vec![
                (route(), serde_json::json!({"branch": 0})),
                (route(), serde_json::json!({"branch": 1})),
                (route(), serde_json::json!({"branch": 2})),
            ],
        );
        assert_eq!(envelopes.len(), 3);
        assert_eq!(envelopes[0].id, "env-1");
        assert_eq!(envelopes[1].id, "env-1-1");
        assert_eq!(envelopes[2].id, "env-1-2");
        assert_eq!(envelopes[1].parent_id.as_deref(), Some("env-1"));
        assert_eq!(envelopes[2].parent_id.as_deref(), Some("env-1"));
    }

    #[test]
    fn children_may_diverge_from_each_others_routes() {
        let divergent = Route::new(vec!["other".into()]).unwrap();
        let envelopes = build_fanout_envelopes(
            "env-1",
            vec![
                (route(), serde_json::json!({})),
                (divergent.clone(), serde_json::json!({})),
            ],
        );
        assert_eq!(envelopes[1].route, divergent);
    }
}
