// ID Provider Port (for deterministic testing)
//
// Mints mutation ids and submission idempotency tokens.

/// ID minting interface (allows deterministic ids in tests)
pub trait IdProvider: Send + Sync {
    /// Mint a new unique identifier
    fn mint(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidMinter;

impl IdProvider for UuidMinter {
    fn mint(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Sequential ids with a fixed prefix (id-1, id-2, ...)
    pub struct SequentialIds {
        prefix: String,
        counter: AtomicU64,
    }

    impl SequentialIds {
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                counter: AtomicU64::new(1),
            }
        }
    }

    impl IdProvider for SequentialIds {
        fn mint(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("{}-{}", self.prefix, n)
        }
    }
}
