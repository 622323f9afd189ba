//! Data retrieval: providers, chunk planning, and the series cache.

pub mod auth;
pub mod cache;
pub mod chunker;
pub mod fred;
pub mod instruments;
pub mod kite;
pub mod provider;
pub mod synthetic;

pub use auth::{AccessToken, StaticToken, TokenService};
pub use cache::{
    file_stem, CacheMeta, CacheRecord, CacheStatus, ChunkFailure, ChunkPolicy, FetchOutcome,
    SeriesCache,
};
pub use chunker::{plan_chunks, ChunkPlan, DateRange, DEFAULT_MAX_CHUNK_DAYS};
pub use fred::{FredProvider, DEFAULT_GDP_SERIES};
pub use instruments::{Instrument, InstrumentCatalog};
pub use kite::{KiteConnector, KiteProvider};
pub use provider::{
    CredentialSource, DataError, FetchProgress, MacroDataProvider, SectorConnector,
    SectorDataProvider, SilentProgress, StdoutProgress,
};
pub use synthetic::SyntheticProvider;
