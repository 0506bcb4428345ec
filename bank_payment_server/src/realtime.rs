//! Server-Sent Events transport for the notification hub.
//!
//! Each SSE response owns one hub connection. The first frame tells the client its connection id, which it can use to
//! join or leave further order topics. The connection is removed from the hub as soon as the response stream is
//! dropped, which is what happens when the client goes away.
use std::time::Duration;

use actix_web::{error::ErrorInternalServerError, Error};
use bank_payment_engine::events::{Connection, ConnectionId, NotificationHub, OrderPush};
use bytes::Bytes;
use futures::{stream, Stream};
use log::*;
use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, Interval},
};

pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

struct ConnectionGuard {
    hub: NotificationHub<OrderPush>,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        trace!("📡️ SSE stream for connection {} closed", self.id);
        self.hub.disconnect(self.id);
    }
}

struct SseState {
    guard: ConnectionGuard,
    receiver: mpsc::Receiver<OrderPush>,
    keep_alive: Interval,
    greeted: bool,
}

/// Turns a hub connection into an SSE byte stream.
pub fn sse_stream(
    hub: NotificationHub<OrderPush>,
    connection: Connection<OrderPush>,
    keep_alive: Duration,
) -> impl Stream<Item = Result<Bytes, Error>> + 'static {
    let Connection { id, receiver } = connection;
    let state = SseState {
        guard: ConnectionGuard { hub, id },
        receiver,
        keep_alive: interval_at(Instant::now() + keep_alive, keep_alive),
        greeted: false,
    };
    stream::unfold(state, |mut state| async move {
        if !state.greeted {
            state.greeted = true;
            let frame = connected_frame(state.guard.id);
            return Some((Ok(frame), state));
        }
        tokio::select! {
            msg = state.receiver.recv() => {
                let push = msg?;
                Some((push_frame(&push), state))
            },
            _ = state.keep_alive.tick() => Some((Ok(Bytes::from_static(b": keep-alive\n\n")), state)),
        }
    })
}

fn connected_frame(id: ConnectionId) -> Bytes {
    let data = serde_json::json!({ "connectionId": id.value() });
    Bytes::from(format!("event: connected\ndata: {data}\n\n"))
}

fn push_frame(push: &OrderPush) -> Result<Bytes, Error> {
    let data = serde_json::to_string(push).map_err(|e| {
        error!("📡️ Could not serialize push message. {e}");
        ErrorInternalServerError("Could not serialize push message")
    })?;
    Ok(Bytes::from(format!("event: order\ndata: {data}\n\n")))
}
