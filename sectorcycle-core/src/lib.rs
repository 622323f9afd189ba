//! SectorCycle Core: domain types, cached data retrieval, and phase analytics.
//!
//! - Domain types (price bars, macro observations, phases, quarters)
//! - Chunk planning for span-limited providers
//! - Per-key CSV cache with cache-or-fetch semantics
//! - Provider traits plus Kite, FRED and synthetic implementations
//! - Phase classification, quarterly returns, per-phase performance,
//!   sector recommendation and return correlation

pub mod analysis;
pub mod data;
pub mod domain;
