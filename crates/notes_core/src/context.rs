//! Per-call cancellation and deadline context.
//!
//! # Responsibility
//! - Carry a caller deadline and/or cancellation flag into repository calls.
//! - Provide the check the store polls while a statement is running.
//!
//! # Invariants
//! - A cancelled token stays cancelled.
//! - Cancellation wins over an elapsed deadline when both apply.

use crate::repo::error::{RepoError, RepoResult};
use std::panic::RefUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation scope for one repository call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Context {
    /// Context that never expires and cannot be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context expiring `timeout` from now.
    ///
    /// A timeout too large to represent behaves like no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancellation: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancellation: None,
        }
    }

    /// Attaches a cancellation token to this context.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails fast when the caller has given up.
    pub fn check(&self) -> RepoResult<()> {
        if self.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        if self.is_expired() {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }

    /// Error to report after the store aborted a statement on our behalf.
    pub(crate) fn interruption(&self) -> RepoError {
        if !self.is_cancelled() && self.is_expired() {
            RepoError::Timeout
        } else {
            RepoError::Cancelled
        }
    }

    /// Check polled by the store; returning `true` aborts the statement.
    pub(crate) fn interrupt_check(&self) -> impl FnMut() -> bool + Send + RefUnwindSafe + 'static {
        let cancelled = self
            .cancellation
            .as_ref()
            .map(|token| Arc::clone(&token.cancelled));
        let deadline = self.deadline;
        move || {
            cancelled
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
                || deadline.is_some_and(|deadline| Instant::now() >= deadline)
        }
    }
}
