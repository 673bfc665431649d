// src/registry.rs

//! Process-wide name registry: `name -> ThreadId` with an inverse map so a
//! terminating thread can drop every name pointing at it in one sweep.
//!
//! A single global mutex serializes all operations; this and the individual
//! mailboxes are the only cross-thread shared writable state in the crate.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::runtime::mailbox::ThreadId;

static REGISTRY: Lazy<Mutex<NameRegistry>> = Lazy::new(|| Mutex::new(NameRegistry::default()));

#[derive(Default)]
struct NameRegistry {
  by_name: HashMap<String, ThreadId>,
  by_tid: HashMap<ThreadId, BTreeSet<String>>,
}

/// Binds `name` to `tid`. Fails (returns `false`) if the name is already
/// taken or the target mailbox has closed.
pub fn register(name: &str, tid: &ThreadId) -> bool {
  let mut reg = REGISTRY.lock();
  if reg.by_name.contains_key(name) {
    trace!(name, "register refused, name taken");
    return false;
  }
  if tid.is_closed() {
    trace!(name, tid = %tid, "register refused, mailbox closed");
    return false;
  }
  reg.by_name.insert(name.to_string(), tid.clone());
  reg
    .by_tid
    .entry(tid.clone())
    .or_default()
    .insert(name.to_string());
  debug!(name, tid = %tid, "name registered");
  true
}

/// Removes `name` from the registry. Returns whether anything was removed.
pub fn unregister(name: &str) -> bool {
  let mut reg = REGISTRY.lock();
  let Some(tid) = reg.by_name.remove(name) else {
    warn!(name, "unregister of unknown name");
    return false;
  };
  if let Some(names) = reg.by_tid.get_mut(&tid) {
    names.remove(name);
    if names.is_empty() {
      reg.by_tid.remove(&tid);
    }
  }
  debug!(name, tid = %tid, "name unregistered");
  true
}

/// Looks up the id currently bound to `name`.
pub fn locate(name: &str) -> Option<ThreadId> {
  REGISTRY.lock().by_name.get(name).cloned()
}

/// Drops every name bound to `tid`. Called from thread cleanup.
pub(crate) fn unregister_all(tid: &ThreadId) {
  let mut reg = REGISTRY.lock();
  let Some(names) = reg.by_tid.remove(tid) else {
    return;
  };
  for name in &names {
    reg.by_name.remove(name);
  }
  debug!(tid = %tid, count = names.len(), "names unregistered at termination");
}
