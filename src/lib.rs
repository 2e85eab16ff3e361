//! Purpose: Shared core library crate used by the `scanspeed` CLI and tests.
//! Exports: `core` (clusters, counting, engine, errors) and `store` (columnar source files).
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: `core` only reads sources; all writes go through `store::writer`.
pub mod core;
pub mod store;
