// src/runtime/mod.rs

//! Core primitives: the mailbox and its processing step.

pub mod mailbox;
pub mod processor;

pub use mailbox::ThreadId;
pub use processor::{process, serve, serve_with, ProcessorSettings};
