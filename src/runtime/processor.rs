// src/runtime/processor.rs

//! The processing side of a mailbox: one dequeue-classify-answer step
//! (`process`) and the conventional request loop (`serve`).
//!
//! Lifecycle control is interpreted here, before any application handler
//! runs: a `LinkDead` notice updates the current thread's owner/link
//! bookkeeping and is re-delivered to the handler as a synthesized
//! owner-terminated or link-terminated message. A handler that declines the
//! synthesized notice escalates it into a `MailError` out of `process`.

use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::context::{self, Relation};
use crate::error::MailError;
use crate::message::{Message, MessageKind, Payload, Request, Response};
use crate::runtime::mailbox::Dequeued;

/// Tuning for [`serve`]'s loop; see [`serve_with`].
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
  /// How long the loop sleeps after finding the queue empty.
  pub idle_wait: Duration,
}

impl Default for ProcessorSettings {
  fn default() -> Self {
    Self {
      idle_wait: Duration::from_millis(1),
    }
  }
}

/// Performs one processing step on the calling thread's own mailbox.
///
/// Returns `Ok(false)` when the mailbox is closed or empty (the handler is
/// not invoked), `Ok(true)` after one message has been handled and its
/// sender woken. The handler receives standard messages and synthesized
/// termination notices; returning `Some(reply)` answers the sender,
/// returning `None` declines (the sender observes a failed response).
///
/// Mailboxes are single-consumer: only the thread that owns the mailbox may
/// process it, which is why this operates on the current thread implicitly.
pub fn process<H>(mut handler: H) -> Result<bool, MailError>
where
  H: FnMut(Message) -> Option<Message>,
{
  let ident = context::this_tid();
  let pending = match ident.mailbox().dequeue() {
    Dequeued::Closed | Dequeued::Empty => return Ok(false),
    Dequeued::Pending(p) => p,
  };
  let req = pending.req;
  let reply = pending.reply;
  trace!(kind = ?req.kind, "processing message");

  match req.kind {
    MessageKind::LinkDead => {
      let Payload::Tid(peer) = req.payload else {
        warn!("malformed link-dead notice dropped");
        return Ok(true);
      };
      // The notice was posted fire-and-forget; waking its sender is
      // dropping the dead slot.
      drop(reply);
      match context::apply_link_dead(&peer) {
        Some(Relation::Owner) => {
          debug!(peer = %peer, "owner terminated");
          let notice = Message::standard(Payload::OwnerTerminated(peer.clone()));
          if handler(notice).is_none() {
            return Err(MailError::OwnerTerminated(peer));
          }
          Ok(true)
        }
        Some(Relation::Link) => {
          debug!(peer = %peer, "linked peer terminated");
          let notice = Message::standard(Payload::LinkTerminated(peer.clone()));
          if handler(notice).is_none() {
            return Err(MailError::LinkTerminated(peer));
          }
          Ok(true)
        }
        None => {
          trace!(peer = %peer, "termination notice from unrelated peer dropped");
          Ok(true)
        }
      }
    }
    // Control-plane shutdown markers are not interpreted; user-initiated
    // shutdown travels as a standard message.
    MessageKind::Shutdown => Ok(true),
    MessageKind::Standard => {
      if let Payload::Request(rq) = &req.payload {
        if rq.expired(Instant::now()) {
          trace!(method = %rq.method, "request expired before processing");
          let _ = reply.send(Message::response(Response::timeout(
            "request expired before processing",
          )));
          return Ok(true);
        }
      }
      match handler(req) {
        Some(answer) => {
          // The submitter may have given up (async caller dropped); that
          // is not the processor's problem.
          let _ = reply.send(answer);
        }
        None => drop(reply),
      }
      Ok(true)
    }
  }
}

/// Runs the conventional processor loop until told to shut down.
///
/// `handler` answers requests; shutdown messages are acknowledged with an
/// empty success response and end the loop. A termination notice the loop
/// cannot consume (there is no request handler for it) is returned as the
/// error, so a worker whose owner dies falls out of `serve` with
/// [`MailError::OwnerTerminated`].
pub fn serve<H>(handler: H) -> Result<(), MailError>
where
  H: FnMut(Request) -> Response,
{
  serve_with(ProcessorSettings::default(), handler)
}

/// [`serve`] with explicit loop settings.
pub fn serve_with<H>(settings: ProcessorSettings, mut handler: H) -> Result<(), MailError>
where
  H: FnMut(Request) -> Response,
{
  let ident = context::this_tid();
  debug!(ident = %ident, "processor loop starting");
  let mut stop = false;
  loop {
    let progressed = process(|msg: Message| match msg.payload {
      Payload::Request(req) => Some(Message::response(handler(req))),
      Payload::Shutdown(_) => {
        stop = true;
        Some(Message::response(Response::success(Bytes::new())))
      }
      _ => None,
    })?;
    if stop {
      debug!(ident = %ident, "processor loop stopped by shutdown");
      return Ok(());
    }
    if !progressed {
      thread::sleep(settings.idle_wait);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{init_current, link, owner_tid, unlink};
  use crate::message::ResponseStatus;
  use crate::runtime::mailbox::ThreadId;
  use crate::this_tid;

  #[test]
  fn empty_queue_makes_no_progress() {
    let progressed = process(|_| panic!("handler must not run")).expect("no error expected");
    assert!(!progressed);
  }

  #[test]
  fn request_is_answered_through_the_reply_slot() {
    let me = this_tid();
    let rx = me
      .mailbox()
      .enqueue(Message::request(Request::new("double", &b"21"[..])))
      .expect("mailbox open");

    let progressed = process(|msg| match msg.payload {
      Payload::Request(req) => {
        assert_eq!(req.method, "double");
        let n: i64 = std::str::from_utf8(&req.args).unwrap().parse().unwrap();
        Some(Message::response(Response::success((n * 2).to_string())))
      }
      other => panic!("unexpected payload: {:?}", other),
    })
    .expect("no error expected");
    assert!(progressed);

    let resp = rx
      .blocking_recv()
      .expect("answered")
      .into_response()
      .expect("response payload");
    assert!(resp.is_success());
    assert_eq!(&resp.data[..], b"42");
  }

  #[test]
  fn declined_request_leaves_the_slot_unwritten() {
    let me = this_tid();
    let rx = me
      .mailbox()
      .enqueue(Message::request(Request::new("nope", Bytes::new())))
      .expect("mailbox open");
    process(|_| None).expect("no error expected");
    assert!(rx.blocking_recv().is_err());
  }

  #[test]
  fn expired_request_gets_a_timeout_without_the_handler() {
    let me = this_tid();
    let mut request = Request::new("slow", Bytes::new()).with_timeout(Duration::from_millis(1));
    request.request_time = Instant::now() - Duration::from_secs(1);
    let rx = me
      .mailbox()
      .enqueue(Message::request(request))
      .expect("mailbox open");

    let progressed =
      process(|_| panic!("handler must not see an expired request")).expect("no error expected");
    assert!(progressed);

    let resp = rx
      .blocking_recv()
      .expect("answered")
      .into_response()
      .expect("response payload");
    assert_eq!(resp.status, ResponseStatus::Timeout);
  }

  #[test]
  fn owner_notice_is_applied_and_delivered() {
    let owner = ThreadId::fresh();
    init_current(ThreadId::fresh(), Some(owner.clone()));
    this_tid().post(Message::link_dead(owner.clone()));

    let mut seen = None;
    let progressed = process(|msg| match msg.payload {
      Payload::OwnerTerminated(tid) => {
        seen = Some(tid);
        Some(Message::response(Response::success(Bytes::new())))
      }
      other => panic!("unexpected payload: {:?}", other),
    })
    .expect("consumed notice must not escalate");
    assert!(progressed);
    assert_eq!(seen, Some(owner));
    assert!(matches!(owner_tid(), Err(MailError::TidMissing)));
  }

  #[test]
  fn unconsumed_link_notice_escalates() {
    let peer = ThreadId::fresh();
    link(peer.clone());
    this_tid().post(Message::link_dead(peer.clone()));

    let err = process(|_| None).expect_err("declined notice must escalate");
    match err {
      MailError::LinkTerminated(tid) => assert_eq!(tid, peer),
      other => panic!("unexpected error: {:?}", other),
    }
    // The bookkeeping was updated before escalation.
    assert!(!unlink(&peer));
  }

  #[test]
  fn notice_from_unrelated_peer_is_dropped() {
    let stranger = ThreadId::fresh();
    this_tid().post(Message::link_dead(stranger));
    let progressed = process(|_| panic!("handler must not run")).expect("no error expected");
    assert!(progressed);
  }

  #[test]
  fn control_shutdown_kind_is_ignored() {
    let me = this_tid();
    me.post(Message {
      kind: MessageKind::Shutdown,
      payload: Payload::Shutdown(me.clone()),
    });
    let progressed = process(|_| panic!("handler must not run")).expect("no error expected");
    assert!(progressed);
  }

  #[test]
  fn serve_acknowledges_shutdown_and_stops() {
    let me = this_tid();
    me.post(Message::standard(Payload::Shutdown(me.clone())));
    serve(|_req| Response::failed("no requests expected")).expect("clean shutdown");
  }
}
