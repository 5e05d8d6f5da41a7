// =============================================================================
// aurora-core — shared contract for the market-data / alert-signal platform
// =============================================================================
//
// Every inter-service boundary in Aurora Market Nexus is a PostgreSQL row:
// the gateway, the exchange worker, and the signal engine are independent
// processes that never call each other directly. This crate is the contract
// they all compile against — the row shapes (`models`), the `pg_notify`
// envelope and channel list (`envelope`), the dedicated-connection listener
// (`listener`), the client wire protocol (`protocol`), the subscription-key
// grammar (`subscription_key`), configuration loading (`config`), and the
// shared error taxonomy (`error`).
// =============================================================================

pub mod config;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod models;
pub mod protocol;
pub mod subscription_key;

pub use error::AppError;
