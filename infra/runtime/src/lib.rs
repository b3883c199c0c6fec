//! # Runtime
//!
//! Tokio runtime construction for the ApexHire binaries.
//!
//! A [`RuntimeProfile`] describes the worker pool; [`build_runtime`] turns it into a
//! multi-threaded runtime with all drivers enabled. Binaries normally go through the
//! [`main`] attribute instead of calling these directly:
//!
//! ```rust,no_run
//! #[apex_runtime::main(server)]
//! async fn main() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

pub use anyhow::Result;
pub use apex_derive::main;

use anyhow::Context;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Overrides the worker count of the `env` profile.
pub const WORKER_THREADS_ENV: &str = "APEX_WORKER_THREADS";

const MAX_WORKER_THREADS: usize = 512;
const FALLBACK_WORKER_THREADS: usize = 4;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Worker pool shape for a Tokio multi-threaded runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    worker_threads: usize,
    stack_size: usize,
    thread_name: String,
    keep_alive: Duration,
}

impl RuntimeProfile {
    /// Sized for the HTTP service: one worker per core, generous keep-alive.
    #[must_use]
    pub fn server() -> Self {
        Self {
            worker_threads: detected_parallelism(),
            stack_size: 4 * MIN_STACK_SIZE,
            thread_name: "apex-server".to_owned(),
            keep_alive: Duration::from_secs(300),
        }
    }

    /// Two workers with small stacks, for tools and tests.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            worker_threads: 2,
            stack_size: 2 * MIN_STACK_SIZE,
            thread_name: "apex-compact".to_owned(),
            keep_alive: Duration::from_secs(30),
        }
    }

    /// Server profile with the worker count taken from `APEX_WORKER_THREADS` when set.
    #[must_use]
    pub fn from_env() -> Self {
        match parse_worker_override(std::env::var(WORKER_THREADS_ENV).ok().as_deref()) {
            Some(threads) => Self::server().with_worker_threads(threads),
            None => Self::server(),
        }
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.thread_name = name;
        }
        self
    }

    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    #[must_use]
    pub const fn stack_size(&self) -> usize {
        self.stack_size
    }

    #[must_use]
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        Self::server()
    }
}

fn parse_worker_override(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok()).filter(|&n| n > 0)
}

fn detected_parallelism() -> usize {
    available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_WORKER_THREADS)
        .min(MAX_WORKER_THREADS)
}

/// Builds a multi-threaded runtime with IO and time drivers enabled.
///
/// # Errors
/// Returns an error if Tokio cannot spawn the worker threads.
pub fn build_runtime(profile: &RuntimeProfile) -> Result<Runtime> {
    debug!(
        threads = profile.worker_threads,
        stack = profile.stack_size,
        name = %profile.thread_name,
        "Building tokio runtime"
    );

    Builder::new_multi_thread()
        .worker_threads(profile.worker_threads)
        .thread_name(&profile.thread_name)
        .thread_stack_size(profile.stack_size)
        .thread_keep_alive(profile.keep_alive)
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_threads_are_clamped() {
        assert_eq!(RuntimeProfile::compact().with_worker_threads(0).worker_threads(), 1);
        assert_eq!(
            RuntimeProfile::compact().with_worker_threads(10_000).worker_threads(),
            MAX_WORKER_THREADS
        );
    }

    #[test]
    fn stack_size_is_clamped() {
        assert_eq!(RuntimeProfile::compact().with_stack_size(10).stack_size(), MIN_STACK_SIZE);
        assert_eq!(
            RuntimeProfile::compact().with_stack_size(usize::MAX).stack_size(),
            MAX_STACK_SIZE
        );
    }

    #[test]
    fn blank_thread_name_is_ignored() {
        assert_eq!(RuntimeProfile::compact().with_thread_name("  ").thread_name(), "apex-compact");
    }

    #[test]
    fn worker_override_ignores_garbage() {
        assert_eq!(parse_worker_override(Some(" 3 ")), Some(3));
        assert_eq!(parse_worker_override(Some("0")), None);
        assert_eq!(parse_worker_override(Some("many")), None);
        assert_eq!(parse_worker_override(None), None);
    }

    #[test]
    fn compact_runtime_executes_futures() -> Result<()> {
        let runtime = build_runtime(&RuntimeProfile::compact())?;
        let value = runtime.block_on(async { 40 + 2 });
        assert_eq!(value, 42);
        Ok(())
    }
}
