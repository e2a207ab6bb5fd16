//! Cooperative cancellation for kernel passes.
//!
//! Kernels look at the token once per grid row.  A cancelled pass
//! therefore stops after at most one more row, which is
//! `width * max_iterations` recurrence steps (divided by the lane
//! width for the vector kernels).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that asks a running pass, and the producer loop
/// around it, to stop.  Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Raise the flag.  Cannot be undone; make a new token instead.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Has anyone raised the flag?
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
