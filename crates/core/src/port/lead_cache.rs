// Lead Cache Port - local snapshot of optimistic state
//
// Survives process restarts while offline: the optimistic status and the
// queue together let the app resume exactly where the user left it.

use crate::domain::LeadReachRecord;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LeadCache: Send + Sync {
    async fn get(&self, lead_id: &str) -> Result<Option<LeadReachRecord>>;

    async fn put(&self, record: &LeadReachRecord) -> Result<()>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct InMemoryLeadCache {
        map: Mutex<HashMap<String, LeadReachRecord>>,
    }

    impl InMemoryLeadCache {
        pub fn new() -> Self {
            Self {
                map: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for InMemoryLeadCache {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LeadCache for InMemoryLeadCache {
        async fn get(&self, lead_id: &str) -> Result<Option<LeadReachRecord>> {
            Ok(self.map.lock().unwrap().get(lead_id).cloned())
        }

        async fn put(&self, record: &LeadReachRecord) -> Result<()> {
            self.map
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.clone());
            Ok(())
        }
    }
}
