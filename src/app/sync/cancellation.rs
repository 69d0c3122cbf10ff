//! Reference-counted cancellation
//!
//! Consumers of a shared fetch attach while they use it. When the last one
//! detaches the fetch is cancelled. Detaching happens in `Drop`, so it runs on
//! every exit path including errors, panics and dropped futures.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RefCountedCancellation {
    token: CancellationToken,
    attached: AtomicUsize,
    opened: AtomicBool,
    fired: AtomicBool,
}

impl RefCountedCancellation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register interest; the returned guard detaches when dropped
    pub fn attach(self: &Arc<Self>) -> AttachGuard {
        self.opened.store(true, Ordering::Release);
        self.attached.fetch_add(1, Ordering::AcqRel);
        AttachGuard {
            owner: Arc::clone(self),
        }
    }

    /// Attach only while the work is still wanted
    ///
    /// Fails once the count has drained to zero, even if the cancel has not
    /// fired yet.
    pub fn try_attach(self: &Arc<Self>) -> Option<AttachGuard> {
        let mut current = self.attached.load(Ordering::Acquire);
        loop {
            if self.fired.load(Ordering::Acquire)
                || (current == 0 && self.opened.load(Ordering::Acquire))
            {
                return None;
            }
            match self.attached.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.opened.store(true, Ordering::Release);
                    return Some(AttachGuard {
                        owner: Arc::clone(self),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Run `task` while attached
    pub async fn run_under_refcount<F>(self: &Arc<Self>, task: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.attach();
        task.await
    }

    /// Token observed by the cancellable work
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Current number of attached consumers
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel regardless of attached consumers
    pub fn cancel(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.token.cancel();
        }
    }

    fn detach(&self) {
        if self.attached.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("Last consumer detached, cancelling transfer");
            self.cancel();
        }
    }
}

/// Scoped attachment to a [`RefCountedCancellation`]
#[derive(Debug)]
#[must_use = "dropping the guard detaches immediately"]
pub struct AttachGuard {
    owner: Arc<RefCountedCancellation>,
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        self.owner.detach();
    }
}
