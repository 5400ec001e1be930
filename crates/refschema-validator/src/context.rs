//! # Call Context — Cancellation & Deadline
//!
//! Every top-level parse or validate call takes a [`Context`]. It travels
//! down to each external fetch, which is the only place the engine
//! suspends, and is checked again at every schema node during validation.
//!
//! A `Context` is cheap to clone; clones share the cancellation signal, so
//! canceling any clone cancels them all.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{LoadError, SchemaError};

/// Cancellation and deadline carried through parse and validate calls.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that never expires and is only canceled explicitly.
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            deadline: None,
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
        }
    }

    /// A fresh context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// A fresh context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    /// Tighten the deadline of this context. A later deadline than the
    /// current one is ignored.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_canceled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast if the context is canceled or expired.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.is_canceled() {
            return Err(SchemaError::Canceled);
        }
        if self.is_expired() {
            return Err(SchemaError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is canceled or its
    /// deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, LoadError>
    where
        F: Future<Output = Result<T, LoadError>>,
    {
        if self.is_canceled() {
            return Err(LoadError::Canceled);
        }
        tokio::select! {
            res = fut => res,
            _ = self.canceled() => Err(LoadError::Canceled),
            _ = self.expired() => Err(LoadError::DeadlineExceeded),
        }
    }

    async fn canceled(&self) {
        let mut rx = self.cancel_rx.clone();
        if rx.wait_for(|canceled| *canceled).await.is_err() {
            // Sender lives as long as any clone of this context.
            std::future::pending::<()>().await;
        }
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
            }
            None => std::future::pending::<()>().await,
        }
    }
}
