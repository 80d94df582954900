use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;

use crate::transport::http::AppState;
use crate::utils::error::NotifierError;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// `GET /api/text-stream`
///
/// The subscription lives inside the response body. When the client goes
/// away hyper drops the body, which drops the subscription and stops the
/// poll task. Keep-alive comments make a dead peer show up within one
/// interval even while the queue is empty.
pub async fn text_stream(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, NotifierError> {
    let subscription = state.notifier.subscribe()?;
    let events = subscription.map(|message| Event::default().json_data(&message));

    Ok((
        [(header::CONNECTION, "keep-alive")],
        Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)),
    ))
}
