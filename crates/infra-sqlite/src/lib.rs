// Reachflow Infrastructure - SQLite Adapter
// Implements: MutationStore (durable offline queue), LeadCache (snapshots)

mod connection;
mod lead_cache;
mod migration;
mod mutation_store;

pub use connection::create_pool;
pub use lead_cache::SqliteLeadCache;
pub use migration::run_migrations;
pub use mutation_store::SqliteMutationStore;

use std::path::PathBuf;

/// Default on-device location of the workflow database
pub fn default_database_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "reachflow", "reachflow")
        .map(|dirs| dirs.data_dir().join("reach.db"))
}

// Note: sqlx::Error conversion is handled by a helper in each adapter
// (orphan rules prevent From<sqlx::Error> for AppError here)
