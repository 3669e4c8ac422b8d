use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::core::SentryHandle;

use super::routes::HttpServerError;

pub type NotificationStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream for posted notifications.
pub fn notifications(
    handle: &'static SentryHandle,
) -> Result<NotificationStream, HttpServerError> {
    let receiver =
        handle
            .broadcasts
            .subscribe_notifications()
            .ok_or(HttpServerError::ServiceUnavailable(
                "notification channel not initialized",
            ))?;

    let stream = BroadcastStream::new(receiver).filter_map(|record| async move {
        match record {
            Ok(record) => match serde_json::to_string(&record) {
                Ok(payload) => Some(Ok(Event::default().event("notification").data(payload))),
                Err(_) => None,
            },
            Err(_) => None,
        }
    });

    let stream: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> = Box::pin(stream);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    ))
}
