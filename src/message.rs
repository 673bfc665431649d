// src/message.rs

//! Message shapes carried through mailboxes.
//!
//! Every queued item is a [`Message`]: a kind tag (standard traffic vs.
//! lifecycle control) plus a [`Payload`]. The request/reply call protocol
//! rides inside standard messages as [`Request`] and [`Response`]; argument
//! and return payloads are opaque byte strings whose encoding is agreed on
//! by the two sides.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::context;
use crate::ThreadId;

/// Coarse classification of a queued message.
///
/// Control kinds are interpreted by the processor itself before any
/// application handler runs; only `Standard` traffic reaches the handler
/// as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  /// Application traffic: requests, responses, user values.
  Standard,
  /// Lifecycle notice: the thread identified by the payload terminated.
  LinkDead,
  /// Control-plane shutdown marker. Currently not interpreted by the
  /// processor; user-initiated shutdown travels as a `Standard` message
  /// carrying [`Payload::Shutdown`].
  Shutdown,
}

/// The value carried by a [`Message`].
///
/// The original design kept this dynamically typed; here it is a closed
/// enum over the shapes the substrate knows about, with [`Payload::Values`]
/// as the catch-all for application payloads packed by [`send`](crate::send).
#[derive(Debug, Clone)]
pub enum Payload {
  /// A user-level call, answered by the processing handler.
  Request(Request),
  /// The answer to a call.
  Response(Response),
  /// A bare thread id; carried by `LinkDead` control messages.
  Tid(ThreadId),
  /// A request that the target thread stop its processing loop.
  Shutdown(ThreadId),
  /// Synthesized by the processor when the current thread's owner
  /// terminated. Never submitted directly.
  OwnerTerminated(ThreadId),
  /// Synthesized by the processor when a linked non-owner peer terminated.
  /// Never submitted directly.
  LinkTerminated(ThreadId),
  /// An application-defined error value.
  UserError(String),
  /// Arbitrary user values packed as a tuple.
  Values(Vec<Bytes>),
}

/// A single unit of mailbox traffic.
#[derive(Debug, Clone)]
pub struct Message {
  pub kind: MessageKind,
  pub payload: Payload,
}

impl Message {
  /// Wraps a payload in a standard (application-level) message.
  pub fn standard(payload: Payload) -> Self {
    Self {
      kind: MessageKind::Standard,
      payload,
    }
  }

  /// A standard message carrying a request.
  pub fn request(request: Request) -> Self {
    Self::standard(Payload::Request(request))
  }

  /// A standard message carrying a response.
  pub fn response(response: Response) -> Self {
    Self::standard(Payload::Response(response))
  }

  /// The lifecycle notice posted to peers when `tid` terminates.
  pub(crate) fn link_dead(tid: ThreadId) -> Self {
    Self {
      kind: MessageKind::LinkDead,
      payload: Payload::Tid(tid),
    }
  }

  /// The envelope a submitter receives when the target mailbox is closed,
  /// or when its pending entry was drained without an answer.
  pub(crate) fn failure_envelope() -> Self {
    Self::response(Response::failed(""))
  }

  /// Extracts the response if this is a response-carrying message.
  pub fn into_response(self) -> Option<Response> {
    match self.payload {
      Payload::Response(r) => Some(r),
      _ => None,
    }
  }
}

/// Disposition of a completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
  /// The call could not be delivered or the handler declined to answer.
  Failed,
  /// The processor found the request expired before the handler ran.
  Timeout,
  /// The handler produced a return value.
  Success,
}

/// A user-level call: a method name plus opaque serialized arguments.
///
/// `request_time` is stamped by [`query`](crate::query) at submission;
/// `delay` and `timeout` are interpreted by the processing side. A zero
/// `timeout` disables expiry.
#[derive(Debug, Clone)]
pub struct Request {
  /// The calling thread; lets handlers address replies or follow-ups.
  pub sender: ThreadId,
  /// Method name, interpreted by the processing handler.
  pub method: String,
  /// Serialized arguments; opaque to the substrate.
  pub args: Bytes,
  /// Submission timestamp (monotonic).
  pub request_time: Instant,
  /// Grace period added to the expiry deadline.
  pub delay: Duration,
  /// Expiry budget measured from `request_time`; zero disables it.
  pub timeout: Duration,
}

impl Request {
  /// Builds a request from the current thread, stamped with the current
  /// time and no delay or timeout.
  pub fn new(method: impl Into<String>, args: impl Into<Bytes>) -> Self {
    Self {
      sender: context::this_tid(),
      method: method.into(),
      args: args.into(),
      request_time: Instant::now(),
      delay: Duration::ZERO,
      timeout: Duration::ZERO,
    }
  }

  /// Sets the expiry budget.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Sets the delay added to the expiry deadline.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Whether the expiry deadline has passed at `now`.
  pub fn expired(&self, now: Instant) -> bool {
    self.timeout > Duration::ZERO
      && now.saturating_duration_since(self.request_time) > self.delay + self.timeout
  }
}

/// The answer to a [`Request`].
///
/// On `Success` the data field holds the serialized return value; on any
/// other status it holds a human-readable description, possibly empty.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: ResponseStatus,
  pub data: Bytes,
}

impl Response {
  /// A successful response carrying a serialized return value.
  pub fn success(data: impl Into<Bytes>) -> Self {
    Self {
      status: ResponseStatus::Success,
      data: data.into(),
    }
  }

  /// A failure response with a human-readable description.
  pub fn failed(description: impl Into<Bytes>) -> Self {
    Self {
      status: ResponseStatus::Failed,
      data: description.into(),
    }
  }

  /// A timeout response with a human-readable description.
  pub fn timeout(description: impl Into<Bytes>) -> Self {
    Self {
      status: ResponseStatus::Timeout,
      data: description.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == ResponseStatus::Success
  }
}
