pub mod index;
pub mod models;

pub use index::UrlIndex;
pub use models::{CreateResult, ImportSummary, ShortUrlRecord, SystemStats, UrlSummary};
