// ABOUTME: Command implementations for the replicator CLI
// ABOUTME: Exports the sync (run loop / single cycle) and validate (preflight) commands

pub mod sync;
pub mod validate;

pub use sync::sync;
pub use validate::validate;
