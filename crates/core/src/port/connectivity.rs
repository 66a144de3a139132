// Connectivity Probe Port
//
// The platform layer knows whether the device currently has a usable
// network path; the engine only asks.

use async_trait::async_trait;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// True when the device currently has connectivity. A `false` answer
    /// routes transitions through the offline mutation queue.
    async fn is_online(&self) -> bool;
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Switchable probe for offline/online test scenarios
    pub struct MockConnectivity {
        online: AtomicBool,
    }

    impl MockConnectivity {
        pub fn new(online: bool) -> Self {
            Self {
                online: AtomicBool::new(online),
            }
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ConnectivityProbe for MockConnectivity {
        async fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }
}
