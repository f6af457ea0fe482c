use std::sync::Arc;

use tokio::sync::RwLock;

use newswatch_common::StorySet;

/// The engine's view of the current story set.
///
/// Readers take an `Arc` snapshot and drop the lock immediately, so a
/// cascade running over one set is never disturbed by the next commit.
#[derive(Clone)]
pub struct StorySetHandle {
    current: Arc<RwLock<Arc<StorySet>>>,
}

impl StorySetHandle {
    pub fn new(initial: StorySet) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub async fn current(&self) -> Arc<StorySet> {
        self.current.read().await.clone()
    }

    /// Swap in a fully built set.
    pub async fn replace(&self, set: Arc<StorySet>) {
        *self.current.write().await = set;
    }
}
