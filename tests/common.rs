// tests/common.rs
#![allow(dead_code)] // Not every test binary uses every helper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

static NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

static TRACING_INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary. Level defaults
/// to debug for this crate; override with RUST_LOG.
pub fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    let default_filter = "threadmail=debug,warn";
    let env_filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_test_writer()
      .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}

/// Generates a registry name unique across the parallel tests of one
/// binary run.
pub fn unique_name(prefix: &str) -> String {
  let pid = std::process::id();
  let count = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("{}-{}-{}", prefix, pid, count)
}

/// Polls `condition` every millisecond until it holds or `deadline`
/// elapses. Returns whether the condition was observed.
pub fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let end = Instant::now() + deadline;
  while Instant::now() < end {
    if condition() {
      return true;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  condition()
}

/// Waits for a thread to close its mailbox.
pub fn wait_for_termination(tid: &threadmail::ThreadId, deadline: Duration) -> bool {
  wait_until(deadline, || !tid.is_alive())
}
