//! Server-Sent Events support

use crate::state_machine::Notice;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert the notice broadcast into an SSE stream, prefixed with a
/// snapshot event so clients can render without a separate fetch
pub fn notice_stream(
    init: Value,
    broadcast_rx: tokio::sync::broadcast::Receiver<Notice>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(Event::default().event("init").data(init.to_string()))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(notice) => Some(Ok(notice_to_event(&notice))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn notice_to_event(notice: &Notice) -> Event {
    let data = serde_json::to_string(notice).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(notice.event_name()).data(data)
}
