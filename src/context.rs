// src/context.rs

//! Per-thread identity and lifecycle: `this_tid`, `owner_tid`, links,
//! spawning, and the termination cleanup that propagates link-dead notices.
//!
//! Each OS thread lazily owns a `ThreadContext` holding its own id, the id
//! of the thread that spawned it, and the set of linked peers. Only the
//! owning thread ever mutates its context; other threads influence it
//! solely through `LinkDead` messages that the owner's processor applies.
//!
//! Cleanup runs from a drop guard on spawned threads (so it also fires on
//! panic) and from the thread-local destructor for threads that entered the
//! substrate on their own. It is idempotent.

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread;

use tracing::{debug, trace};

use crate::error::MailError;
use crate::message::Message;
use crate::registry;
use crate::runtime::mailbox::ThreadId;

thread_local! {
  static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::new());
}

/// How a dead peer related to the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
  Owner,
  Link,
}

struct ThreadContext {
  ident: Option<ThreadId>,
  owner: Option<ThreadId>,
  links: HashSet<ThreadId>,
  cleaned: bool,
}

impl ThreadContext {
  fn new() -> Self {
    Self {
      ident: None,
      owner: None,
      links: HashSet::new(),
      cleaned: false,
    }
  }

  fn cleanup(&mut self) {
    if self.cleaned {
      return;
    }
    self.cleaned = true;

    let Some(ident) = self.ident.clone() else {
      // The thread never touched the substrate; nothing to tear down.
      self.owner = None;
      self.links.clear();
      return;
    };
    debug!(ident = %ident, links = self.links.len(), "thread context cleaning up");

    // Close first: from here on no new submissions are admitted, and the
    // drained queue tells us which linked peers are already gone so we do
    // not notify the dead.
    let drained = ident.mailbox().close();
    for peer in drained {
      if self.owner.as_ref() == Some(&peer) {
        self.owner = None;
      }
      self.links.remove(&peer);
    }

    let mut targets = std::mem::take(&mut self.links);
    if let Some(owner) = self.owner.take() {
      targets.insert(owner);
    }
    for peer in targets {
      trace!(peer = %peer, "posting termination notice");
      peer.post(Message::link_dead(ident.clone()));
    }

    registry::unregister_all(&ident);
  }
}

impl Drop for ThreadContext {
  fn drop(&mut self) {
    self.cleanup();
  }
}

/// Runs context cleanup when dropped; held across the body of every
/// spawned thread so termination (including panic unwinding) always
/// closes the mailbox and notifies peers.
struct CleanupGuard;

impl Drop for CleanupGuard {
  fn drop(&mut self) {
    CONTEXT.with(|c| c.borrow_mut().cleanup());
  }
}

fn run_child<F: FnOnce()>(ident: ThreadId, owner: ThreadId, f: F) {
  init_current(ident, Some(owner));
  let _guard = CleanupGuard;
  f();
}

pub(crate) fn init_current(ident: ThreadId, owner: Option<ThreadId>) {
  CONTEXT.with(|c| {
    let mut ctx = c.borrow_mut();
    ctx.ident = Some(ident);
    ctx.owner = owner;
  });
}

/// Returns the current thread's id, allocating its mailbox on first use.
pub fn this_tid() -> ThreadId {
  CONTEXT.with(|c| {
    let mut ctx = c.borrow_mut();
    if let Some(ident) = &ctx.ident {
      return ident.clone();
    }
    let ident = ThreadId::fresh();
    debug!(ident = %ident, "thread context initialized");
    ctx.ident = Some(ident.clone());
    ident
  })
}

/// Returns the id of the thread that spawned this one.
pub fn owner_tid() -> Result<ThreadId, MailError> {
  CONTEXT.with(|c| c.borrow().owner.clone().ok_or(MailError::TidMissing))
}

/// Records `peer` in the current thread's link set: our termination will
/// post a notice to `peer`, and `peer`'s termination notice will reach our
/// handler as a link-terminated message. The relation is one-sided; two
/// threads that each link the other get mutual notices.
///
/// Returns `false` if `peer` was already linked (or is this thread itself).
pub fn link(peer: ThreadId) -> bool {
  CONTEXT.with(|c| {
    let mut ctx = c.borrow_mut();
    if ctx.ident.as_ref() == Some(&peer) {
      return false;
    }
    ctx.links.insert(peer)
  })
}

/// Removes `peer` from the current thread's link set. Returns whether it
/// was present.
pub fn unlink(peer: &ThreadId) -> bool {
  CONTEXT.with(|c| c.borrow_mut().links.remove(peer))
}

/// Applies a `LinkDead(peer)` notice to the current thread's bookkeeping
/// and reports what `peer` was to us, if anything.
pub(crate) fn apply_link_dead(peer: &ThreadId) -> Option<Relation> {
  CONTEXT.with(|c| {
    let mut ctx = c.borrow_mut();
    if ctx.owner.as_ref() == Some(peer) {
      ctx.owner = None;
      ctx.links.remove(peer);
      Some(Relation::Owner)
    } else if ctx.links.remove(peer) {
      Some(Relation::Link)
    } else {
      None
    }
  })
}

/// Options for [`spawn_with`]: forwarded to `std::thread::Builder`.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
  /// OS thread name, visible in debuggers and panic messages.
  pub name: Option<String>,
  /// Stack size in bytes.
  pub stack_size: Option<usize>,
}

impl SpawnOptions {
  fn into_builder(self) -> thread::Builder {
    let mut builder = thread::Builder::new();
    if let Some(name) = self.name {
      builder = builder.name(name);
    }
    if let Some(stack_size) = self.stack_size {
      builder = builder.stack_size(stack_size);
    }
    builder
  }
}

/// Starts a new logical thread running `f` and returns its id.
///
/// The child's context records the caller as its owner; the caller records
/// the child in its link set. Either side's termination is delivered to the
/// other as an in-band message. The closure must be `Send + 'static`, which
/// rules out smuggling references to the caller's unshared state.
pub fn spawn<F>(f: F) -> ThreadId
where
  F: FnOnce() + Send + 'static,
{
  let child = ThreadId::fresh();
  let owner = this_tid();
  debug!(child = %child, "spawning thread");
  // Link before the thread starts: a child that exits immediately must
  // find itself in our link set when its termination notice is applied.
  link(child.clone());
  let ident = child.clone();
  thread::spawn(move || run_child(ident, owner, f));
  child
}

/// Like [`spawn`], with thread options. OS-level spawn failure is returned
/// instead of panicking.
pub fn spawn_with<F>(options: SpawnOptions, f: F) -> Result<ThreadId, MailError>
where
  F: FnOnce() + Send + 'static,
{
  let child = ThreadId::fresh();
  let owner = this_tid();
  debug!(child = %child, name = options.name.as_deref(), "spawning thread");
  link(child.clone());
  let ident = child.clone();
  if let Err(e) = options
    .into_builder()
    .spawn(move || run_child(ident, owner, f))
  {
    unlink(&child);
    return Err(MailError::Io(e));
  }
  Ok(child)
}

/// Spawns a thread and registers its id under `name` before it starts, so
/// a successful return guarantees `locate(name)` finds the child. The name
/// is dropped automatically when the child terminates.
pub fn spawn_registered<F>(name: &str, f: F) -> Result<ThreadId, MailError>
where
  F: FnOnce() + Send + 'static,
{
  let child = ThreadId::fresh();
  if !registry::register(name, &child) {
    return Err(MailError::NameTaken(name.to_string()));
  }
  let owner = this_tid();
  debug!(child = %child, name, "spawning registered thread");
  link(child.clone());
  let ident = child.clone();
  thread::spawn(move || run_child(ident, owner, f));
  Ok(child)
}
