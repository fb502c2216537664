//! `/api/events`: server-sent subscription stream.
//!
//! Frames are `event: <name>\ndata: <json>\n\n` with names `connected`,
//! `status`, `entity`, `approval`. Each subscriber drains its own bounded
//! queue off the broadcast bus; a subscriber that lags past the queue bound
//! receives one final `status` frame carrying `{"lost": n}` and is
//! disconnected. Producers never wait for slow subscribers.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use zeusapp::events::BusEvent;

use super::AppState;

type SseItem = Result<Event, Infallible>;

struct BusEventStream {
    inner: BroadcastStream<BusEvent>,
    lagged: bool,
}

impl Stream for BusEventStream {
    type Item = SseItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.lagged {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(to_sse(&event)))),
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(lost)))) => {
                self.lagged = true;
                let marker = Event::default()
                    .event("status")
                    .data(format!("{{\"lost\":{lost}}}"));
                Poll::Ready(Some(Ok(marker)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn to_sse(event: &BusEvent) -> Event {
    let data = serde_json::to_string(event)
        .unwrap_or_else(|_| format!("{{\"seq\":{}}}", event.seq));
    Event::default().event(event.kind.name()).data(data)
}

pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = SseItem>> {
    let rx = state.api.bus().subscribe();
    let connected = tokio_stream::once(Ok(Event::default().event("connected").data("{}")));
    let stream = connected.chain(BusEventStream {
        inner: BroadcastStream::new(rx),
        lagged: false,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
