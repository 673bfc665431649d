// src/runtime/mailbox.rs

//! The mailbox: a FIFO of suspended senders, owned 1:1 by a logical thread.
//!
//! Each submission enqueues a [`PendingSend`] whose reply slot is a oneshot
//! channel. The channel doubles as the wakeup handle: an async caller awaits
//! the receiver, a plain OS-thread caller blocks on it, and fire-and-forget
//! posts drop the receiver up front. The processing side answers by sending
//! into the slot; leaving the slot unwritten (dropping the sender) is how a
//! drained or unanswered submission surfaces as a failed response.
//!
//! The mutex covers queue inspection, enqueue, the closed flag, and the
//! dequeue step. Suspension, handler invocation, and wakeup all happen
//! outside it.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::message::{Message, MessageKind, Payload};

/// A queued submission: the request message and the slot the processor
/// answers into. Dropping `reply` unanswered wakes the submitter with a
/// failure envelope.
#[derive(Debug)]
pub(crate) struct PendingSend {
  pub(crate) req: Message,
  pub(crate) reply: oneshot::Sender<Message>,
}

/// Outcome of a dequeue attempt.
pub(crate) enum Dequeued {
  /// The mailbox is closed; nothing will ever be dequeued again.
  Closed,
  /// The queue is currently empty.
  Empty,
  /// The next submission, in FIFO order.
  Pending(PendingSend),
}

#[derive(Debug, Default)]
struct MailboxInner {
  closed: bool,
  queue: VecDeque<PendingSend>,
}

/// The synchronization object behind a [`ThreadId`].
///
/// Not exposed directly; all interaction goes through `ThreadId` methods.
#[derive(Debug)]
pub(crate) struct Mailbox {
  inner: Mutex<MailboxInner>,
}

impl Mailbox {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self {
      inner: Mutex::new(MailboxInner::default()),
    })
  }

  /// Enqueues `msg` and returns the receiver half of its reply slot, or
  /// `None` if the mailbox is closed. The lock is held only for the
  /// closed-check and the push.
  pub(crate) fn enqueue(&self, msg: Message) -> Option<oneshot::Receiver<Message>> {
    let mut inner = self.inner.lock();
    if inner.closed {
      return None;
    }
    let (tx, rx) = oneshot::channel();
    inner.queue.push_back(PendingSend { req: msg, reply: tx });
    trace!(queue_len = inner.queue.len(), "submission enqueued");
    Some(rx)
  }

  /// Blocking submit. Suspends the calling OS thread until the owning
  /// thread's processor answers (or drains the queue).
  pub(crate) fn submit(&self, msg: Message) -> Message {
    let Some(rx) = self.enqueue(msg) else {
      return Message::failure_envelope();
    };
    match rx.blocking_recv() {
      Ok(reply) => reply,
      // Slot dropped unanswered: the mailbox was closed underneath us.
      Err(_) => Message::failure_envelope(),
    }
  }

  /// Async submit. Suspends the calling task until answered or drained.
  pub(crate) async fn submit_async(&self, msg: Message) -> Message {
    let Some(rx) = self.enqueue(msg) else {
      return Message::failure_envelope();
    };
    match rx.await {
      Ok(reply) => reply,
      Err(_) => Message::failure_envelope(),
    }
  }

  /// Fire-and-forget enqueue: nobody waits on the reply slot. Used for
  /// lifecycle notices so a terminating thread never blocks on its peers.
  /// Silently dropped when the mailbox is closed.
  pub(crate) fn post(&self, msg: Message) {
    match self.enqueue(msg) {
      Some(_rx) => {}
      None => trace!("post dropped, mailbox closed"),
    }
  }

  /// Pops the next submission in FIFO order.
  pub(crate) fn dequeue(&self) -> Dequeued {
    let mut inner = self.inner.lock();
    if inner.closed {
      return Dequeued::Closed;
    }
    match inner.queue.pop_front() {
      Some(pending) => Dequeued::Pending(pending),
      None => Dequeued::Empty,
    }
  }

  /// One-way transition to closed. Drains the queue in FIFO order, waking
  /// every pending sender with an unwritten slot, and returns the thread
  /// ids carried by any drained `LinkDead` notices so the caller can keep
  /// its link bookkeeping consistent during shutdown.
  pub(crate) fn close(&self) -> Vec<ThreadId> {
    let drained = {
      let mut inner = self.inner.lock();
      inner.closed = true;
      std::mem::take(&mut inner.queue)
    };
    let mut link_dead = Vec::new();
    for pending in drained {
      if pending.req.kind == MessageKind::LinkDead {
        if let Payload::Tid(peer) = pending.req.payload {
          link_dead.push(peer);
        }
      }
      // Dropping `pending.reply` here wakes the sender with a failure.
    }
    link_dead
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.inner.lock().closed
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.inner.lock().queue.len()
  }
}

/// Opaque handle identifying a logical thread's mailbox.
///
/// Cheap to clone; equality and hashing are by mailbox identity. The
/// textual form is derived from the mailbox address, so after a thread
/// terminates its text may later collide with a fresh id. Holding a
/// `ThreadId` keeps only the mailbox record alive, never the thread.
#[derive(Clone)]
pub struct ThreadId {
  mailbox: Arc<Mailbox>,
}

impl ThreadId {
  /// Allocates a fresh mailbox and its id.
  pub(crate) fn fresh() -> Self {
    Self {
      mailbox: Mailbox::new(),
    }
  }

  /// Submits a message and blocks the calling OS thread until the owning
  /// thread answers. On a closed mailbox this returns a failed-response
  /// envelope immediately, without enqueuing.
  ///
  /// Must not be called from an async context; use [`submit_async`]
  /// (or [`query_async`](crate::query_async)) there.
  ///
  /// [`submit_async`]: ThreadId::submit_async
  pub fn submit(&self, msg: Message) -> Message {
    self.mailbox.submit(msg)
  }

  /// Submits a message and suspends the calling task until answered.
  /// Closed-mailbox behavior matches [`submit`](ThreadId::submit).
  pub async fn submit_async(&self, msg: Message) -> Message {
    self.mailbox.submit_async(msg).await
  }

  /// Whether the mailbox behind this id still accepts submissions.
  pub fn is_alive(&self) -> bool {
    !self.mailbox.is_closed()
  }

  pub(crate) fn post(&self, msg: Message) {
    self.mailbox.post(msg);
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.mailbox.is_closed()
  }

  pub(crate) fn mailbox(&self) -> &Mailbox {
    &self.mailbox
  }
}

impl PartialEq for ThreadId {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.mailbox, &other.mailbox)
  }
}

impl Eq for ThreadId {}

impl Hash for ThreadId {
  fn hash<H: Hasher>(&self, state: &mut H) {
    Arc::as_ptr(&self.mailbox).hash(state);
  }
}

impl fmt::Display for ThreadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Tid({:p})", Arc::as_ptr(&self.mailbox))
  }
}

impl fmt::Debug for ThreadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ThreadId({:p})", Arc::as_ptr(&self.mailbox))
  }
}
