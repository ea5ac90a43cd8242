//! Build generations for dropping superseded composites.
//!
//! Each new build takes a ticket; only the holder of the latest ticket may
//! publish its result. Older builds find out at their next checkpoint and
//! return [`CompositeOutcome::Superseded`](crate::CompositeOutcome).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::CompositeKey;

/// Shared generation counter.
#[derive(Debug, Clone, Default)]
pub struct BuildEpoch {
    generation: Arc<AtomicU64>,
}

/// Proof of which build a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTicket {
    pub generation: u64,
    pub key: CompositeKey,
}

impl BuildEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new build, superseding every earlier ticket.
    pub fn begin(&self, key: CompositeKey) -> BuildTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        BuildTicket { generation, key }
    }

    pub fn is_current(&self, ticket: &BuildTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes() {
        let epoch = BuildEpoch::new();
        let first = epoch.begin(CompositeKey::from_raw("a"));
        assert!(epoch.is_current(&first));

        let clone = epoch.clone();
        let second = clone.begin(CompositeKey::from_raw("b"));
        assert!(!epoch.is_current(&first));
        assert!(epoch.is_current(&second));
        assert_eq!(epoch.current(), 2);
    }
}
