// src/protocol.rs

//! The user-level call protocol over mailboxes: `query`, `send`,
//! `shutdown`.
//!
//! A query always comes back as a [`Response`]; delivery failures are
//! encoded in its status, never raised. The timeout field on a request is
//! enforced by the processing side, not here.

use std::time::Instant;

use bytes::Bytes;
use tracing::trace;

use crate::message::{Message, Payload, Request, Response};
use crate::runtime::mailbox::ThreadId;

fn extract_response(reply: Message) -> Response {
  match reply.into_response() {
    Some(response) => response,
    None => {
      // The handler answered with something other than a response; the
      // caller only understands the call protocol.
      trace!("non-response reply mapped to failure");
      Response::failed("")
    }
  }
}

/// Submits `request` to `target` and blocks until the response arrives.
///
/// The request is stamped with the submission time. A closed target, a
/// drained queue, or a handler that declines all come back as
/// `Response { status: Failed, .. }`.
///
/// Must not be called from an async context; use [`query_async`] there.
pub fn query(target: &ThreadId, mut request: Request) -> Response {
  request.request_time = Instant::now();
  trace!(target = %target, method = %request.method, "query");
  extract_response(target.submit(Message::request(request)))
}

/// Async variant of [`query`]: suspends the calling task instead of
/// blocking the thread.
pub async fn query_async(target: &ThreadId, mut request: Request) -> Response {
  request.request_time = Instant::now();
  trace!(target = %target, method = %request.method, "query (async)");
  extract_response(target.submit_async(Message::request(request)).await)
}

/// Submits `values` to `target` as a standard message, packed as a tuple,
/// and blocks until the processing handler has seen it. Returns whatever
/// message the handler answered with (a failure envelope if it declined or
/// the target was closed).
pub fn send(target: &ThreadId, values: Vec<Bytes>) -> Message {
  trace!(target = %target, count = values.len(), "send");
  target.submit(Message::standard(Payload::Values(values)))
}

/// Asks `target`'s processor loop to stop. Fire-and-forget from the
/// caller's perspective: the loop acknowledges the message before exiting,
/// and a closed target answers immediately with a failure envelope, so this
/// never blocks indefinitely.
pub fn shutdown(target: &ThreadId) {
  trace!(target = %target, "shutdown requested");
  let _ack = target.submit(Message::standard(Payload::Shutdown(target.clone())));
}

/// Async variant of [`shutdown`].
pub async fn shutdown_async(target: &ThreadId) {
  trace!(target = %target, "shutdown requested (async)");
  let _ack = target
    .submit_async(Message::standard(Payload::Shutdown(target.clone())))
    .await;
}
