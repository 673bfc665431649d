use std::io;
use thiserror::Error;

use crate::ThreadId;

/// Errors surfaced by the context and processor layers.
///
/// The mailbox itself never produces an error: submitting to a closed or
/// draining mailbox, a handler that declines to answer, and processor-side
/// timeout detection are all reported in-band as a `Response` with the
/// matching status. Only conditions observed *outside* the message flow
/// (a missing owner, an unconsumed termination notice, an OS-level spawn
/// failure) become a `MailError`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MailError {
  /// `owner_tid()` was called on a thread that was not spawned through this
  /// crate and never had an owner recorded.
  #[error("calling thread has no owner")]
  TidMissing,

  /// The owner of the current thread terminated and the processing handler
  /// did not consume the synthesized notice.
  #[error("owner thread {0} terminated")]
  OwnerTerminated(ThreadId),

  /// A linked (non-owner) peer terminated and the processing handler did
  /// not consume the synthesized notice.
  #[error("linked thread {0} terminated")]
  LinkTerminated(ThreadId),

  /// The requested registry name is already bound to another mailbox.
  #[error("name already registered: {0}")]
  NameTaken(String),

  /// The OS refused to start a thread.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}
