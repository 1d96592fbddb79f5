use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Store of previous plans, keyed by task text.
///
/// Passed explicitly to whatever needs it; there is no process-wide instance.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save_plan(&self, task: &str, plan: &str) -> anyhow::Result<()>;

    /// Most recent plan saved for `task`.
    async fn latest_plan(&self, task: &str) -> anyhow::Result<Option<String>>;
}

/// Process-local plan store. Keeps only the latest plan per task.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, String>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalise_key(task: &str) -> String {
    task.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save_plan(&self, task: &str, plan: &str) -> anyhow::Result<()> {
        self.plans
            .write()
            .await
            .insert(normalise_key(task), plan.to_string());
        Ok(())
    }

    async fn latest_plan(&self, task: &str) -> anyhow::Result<Option<String>> {
        Ok(self.plans.read().await.get(&normalise_key(task)).cloned())
    }
}
