//! Live event stream handler (SSE).

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tracing::debug;

use gifsmith_models::{JobId, JobState, StreamEvent};

use crate::metrics;
use crate::state::AppState;

/// Subscribe to a job's event stream.
///
/// Events arrive in the order the pipeline produced them and the stream
/// ends right after the terminal event. Anything published before the
/// subscription is replayed first, so a client connecting mid-run still
/// sees the full history. When no read completes within the configured
/// window a keepalive is emitted so proxies do not cut the connection.
/// A subscriber arriving after the channel is gone gets a single
/// synthesized terminal event reflecting the job's final state; unknown
/// or expired identifiers get a single error event rather than an HTTP
/// failure, so event consumers only ever parse one shape.
pub type EventStream = BoxStream<'static, Result<Event, Infallible>>;

pub async fn stream_events(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Sse<EventStream> {
    metrics::record_stream_connection();

    let Ok(job_id) = JobId::parse(&raw_id) else {
        return replay(StreamEvent::error("unknown job"));
    };
    let read_timeout = state.service.config().stream_read_timeout;

    let sub = match state.service.subscribe(job_id) {
        Some(sub) => sub,
        None => {
            let event = match state.service.load_job(job_id) {
                Ok(record) => {
                    debug!(%job_id, "late subscriber, replaying terminal state");
                    terminal_for_state(record.state, record.artifacts.len() as u32)
                }
                Err(_) => StreamEvent::error("unknown job"),
            };
            return replay(event);
        }
    };

    let finished = sub.backlog.iter().any(StreamEvent::is_terminal);
    let backlog = stream::iter(
        sub.backlog
            .into_iter()
            .map(|event| Ok(sse_event(&event)))
            .collect::<Vec<_>>(),
    );
    if finished {
        return Sse::new(backlog.boxed());
    }

    let live = stream::unfold(Some(sub.live), move |rx| async move {
        let mut rx = rx?;
        loop {
            match tokio::time::timeout(read_timeout, rx.recv()).await {
                Ok(Ok(event)) => {
                    let next = if event.is_terminal() { None } else { Some(rx) };
                    return Some((Ok(sse_event(&event)), next));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!(skipped, "event stream reader lagged");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => {
                    return Some((Ok(sse_event(&StreamEvent::Keepalive)), Some(rx)));
                }
            }
        }
    });

    Sse::new(backlog.chain(live).boxed())
}

/// A stream that carries exactly one event and ends.
fn replay(event: StreamEvent) -> Sse<EventStream> {
    Sse::new(stream::iter(vec![Ok(sse_event(&event))]).boxed())
}

fn sse_event(event: &StreamEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(sse) => sse,
        // StreamEvent serialization is infallible in practice.
        Err(_) => Event::default().data("{}"),
    }
}

/// Terminal event equivalent to a job's recorded final state.
fn terminal_for_state(state: JobState, artifacts: u32) -> StreamEvent {
    match state {
        JobState::Completed => StreamEvent::complete(artifacts),
        JobState::Cancelled => StreamEvent::cancelled(),
        _ => StreamEvent::error("processing failed"),
    }
}
