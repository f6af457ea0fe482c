pub mod cascade;
pub mod engine;
pub mod ingestion;
pub mod matcher;
pub mod memory_store;
pub mod mutation_queue;
pub mod reaper;
pub mod refresh;
pub mod scheduler;
pub mod service;
pub mod story_set;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use engine::Engine;
pub use memory_store::MemoryStore;
pub use mutation_queue::MutationQueue;
pub use scheduler::EngineHealth;
pub use service::NewsWatchService;
pub use traits::{DocumentStore, FeedSource, Versioned};
