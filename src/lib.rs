//! Purpose: Read-only engine for db721 columnar files.
//! Exports: `api` (table handles, planning, scans, errors).
//! Role: Library consumed by a host query executor; no binaries, no global state.
//! Invariants: `api` is the only public path; `core` stays internal.
//! Invariants: Each opened table is an independent handle; callers own any caching.
pub mod api;
mod core;
