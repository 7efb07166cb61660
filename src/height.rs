//! Block height source
//!
//! The engine never tracks time itself. Expiration is measured against a
//! monotonically non-decreasing height provided by the embedding ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Provider of the current block height
pub trait HeightSource: Send + Sync {
    fn current_height(&self) -> u64;
}

impl<H: HeightSource + ?Sized> HeightSource for Arc<H> {
    fn current_height(&self) -> u64 {
        (**self).current_height()
    }
}

/// A shared, manually driven height counter
///
/// Clones observe the same counter, so a test or embedder can keep one handle
/// and advance it while the engine holds another.
#[derive(Clone, Debug, Default)]
pub struct ManualHeight {
    height: Arc<AtomicU64>,
}

impl ManualHeight {
    pub fn new(start: u64) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Advance by `blocks`, returning the new height
    pub fn advance(&self, blocks: u64) -> u64 {
        let mut current = self.height.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(blocks);
            match self.height.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Move to `height`; lower values are ignored
    pub fn set(&self, height: u64) -> u64 {
        self.height.fetch_max(height, Ordering::SeqCst).max(height)
    }
}

impl HeightSource for ManualHeight {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}
