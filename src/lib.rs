// src/lib.rs

//! threadmail - in-process request/response messaging between threads.
//!
//! Turns an interface implemented by one logical thread into a call-able
//! API from other threads: callers submit a [`Request`] to the target's
//! mailbox and suspend (an async task awaits, a plain OS thread blocks)
//! until the owning thread's processor answers with a [`Response`].
//! Layered on top: a process-wide name registry so threads can find each
//! other without sharing handles, and a lifecycle protocol that turns the
//! termination of an owner or linked thread into an in-band message for
//! its dependents.
//!
//! ```
//! use threadmail::{query, serve, shutdown, spawn, Request, Response};
//!
//! let worker = spawn(|| {
//!   let _ = serve(|req| Response::success(req.args));
//! });
//!
//! let reply = query(&worker, Request::new("echo", &b"ping"[..]));
//! assert!(reply.is_success());
//! assert_eq!(&reply.data[..], b"ping");
//!
//! shutdown(&worker);
//! ```

/// Per-thread identity, linking, spawning, and termination cleanup.
pub mod context;
/// The error taxonomy for context- and processor-level failures.
pub mod error;
/// Message, request, and response shapes.
pub mod message;
/// The user-level call protocol: query, send, shutdown.
pub mod protocol;
/// The process-wide name registry.
pub mod registry;
/// Core primitives: the mailbox and its processing step.
pub mod runtime;

pub use context::{
  link, owner_tid, spawn, spawn_registered, spawn_with, this_tid, unlink, SpawnOptions,
};
pub use error::MailError;
pub use message::{Message, MessageKind, Payload, Request, Response, ResponseStatus};
pub use protocol::{query, query_async, send, shutdown, shutdown_async};
pub use registry::{locate, register, unregister};
pub use runtime::{process, serve, serve_with, ProcessorSettings, ThreadId};

/// Major version number of the library.
const VERSION_MAJOR: u32 = 0;
/// Minor version number of the library.
const VERSION_MINOR: u32 = 1;
/// Patch version number of the library.
const VERSION_PATCH: u32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (u32, u32, u32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
