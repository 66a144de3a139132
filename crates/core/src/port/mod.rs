// Port Layer - Interfaces for external collaborators

pub mod connectivity;
pub mod id_provider;
pub mod job_gateway;
pub mod lead_cache;
pub mod lead_store;
pub mod mutation_store;
pub mod time_provider;

// Re-exports
pub use connectivity::ConnectivityProbe;
pub use id_provider::IdProvider;
pub use job_gateway::JobGateway;
pub use lead_cache::LeadCache;
pub use lead_store::{LeadStore, ReplayOutcome};
pub use mutation_store::MutationStore;
pub use time_provider::TimeProvider;
