pub mod chunk_fetcher;
pub mod normalizer;

pub use chunk_fetcher::{ChunkClaim, ChunkFetcher};
pub use normalizer::{normalize, Unparseable};
