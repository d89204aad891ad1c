use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

/// Cooperative cancellation signal for long-running operations.
///
/// Opening, payload reads, saving, and texture decoding check the token at
/// each I/O boundary, before each entry during a save, and before each mip
/// level during a decode. A tripped token surfaces as [`Error::Cancelled`]
/// and leaves the package in its pre-operation state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Signal cancellation. Observed by all clones of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Cancelled`] if the token has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
