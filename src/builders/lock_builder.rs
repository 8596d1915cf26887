//! Strategy selection.

use std::sync::Arc;

use crate::config::{LockConfig, StrategyKind};
use crate::lock::{AdaptiveLock, FairFifoLock, LockManager, ReaderPriorityLock, WriterPriorityLock};

/// Build the lock manager named by `cfg.strategy`.
///
/// # Errors
///
/// Returns the validation message when `cfg` is invalid.
pub fn build_lock_manager(cfg: &LockConfig) -> Result<Arc<dyn LockManager>, String> {
    cfg.validate()?;
    let timeout = cfg.admission_timeout();
    let lock: Arc<dyn LockManager> = match cfg.strategy {
        StrategyKind::ReaderPriority => Arc::new(ReaderPriorityLock::new(timeout)),
        StrategyKind::WriterPriority => Arc::new(WriterPriorityLock::new(timeout)),
        StrategyKind::FairFifo => Arc::new(FairFifoLock::new(timeout)),
        StrategyKind::Adaptive => {
            Arc::new(AdaptiveLock::new(cfg.starvation_threshold(), timeout))
        }
    };
    Ok(lock)
}
