//! `GET /envelopes/{id}/stream`: Server-Sent-Events updates for one
//! envelope, with a keepalive comment so intermediaries don't time out an
//! otherwise-idle connection.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};

use crate::app::AppState;
use crate::store::EnvelopeUpdate;

pub async fn stream(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let rx = match state.store.subscribe(&id) {
        Ok(rx) => rx,
        Err(err) => return err.into_response(),
    };

    let events = into_event_stream(rx);
    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.sse_keepalive).text("keepalive"))
        .into_response()
}

fn into_event_stream(
    rx: tokio::sync::mpsc::Receiver<EnvelopeUpdate>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        let update = rx.recv().await?;
        let terminal = update.envelope.status.is_terminal();
        let event = Event::default()
            .json_data(&update.envelope)
            .unwrap_or_else(|_| Event::default().data("serialization error"));
        let next_state = if terminal { None } else { Some(rx) };
        Some((Ok(event), next_state))
    })
}
