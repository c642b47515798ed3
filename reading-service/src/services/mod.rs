pub mod database;
pub mod image;
pub mod landmarks;
pub mod metrics;
pub mod prompts;
pub mod providers;

pub use database::{InMemoryReadingStore, ReadingDb, ReadingStore};
pub use landmarks::{DetectionOptions, LandmarkDetector, RemoteLandmarkDetector};
pub use providers::{ChatProvider, ProviderError};
