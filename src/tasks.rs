//! In-memory bookkeeping for searches started from the UI. Lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Generating,
    Scraping,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub prompt: String,
    pub status: TaskStatus,
    pub query: Option<String>,
    pub links_found: usize,
    pub failed: usize,
    pub profiles: Vec<Profile>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub prompt: String,
    pub status: TaskStatus,
    pub profile_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&TaskResult> for TaskSummary {
    fn from(task: &TaskResult) -> Self {
        Self {
            task_id: task.task_id,
            prompt: task.prompt.clone(),
            status: task.status,
            profile_count: task.profiles.len(),
            created_at: task.created_at,
        }
    }
}

#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<Uuid, TaskResult>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, prompt: &str) -> Uuid {
        let task_id = Uuid::new_v4();
        let task = TaskResult {
            task_id,
            prompt: prompt.to_string(),
            status: TaskStatus::Generating,
            query: None,
            links_found: 0,
            failed: 0,
            profiles: Vec::new(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.inner.write().await.insert(task_id, task);
        task_id
    }

    pub async fn get(&self, task_id: Uuid) -> Option<TaskResult> {
        self.inner.read().await.get(&task_id).cloned()
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<TaskSummary> {
        let guard = self.inner.read().await;
        let mut summaries: Vec<TaskSummary> = guard.values().map(TaskSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    pub async fn start_scraping(&self, task_id: Uuid, query: &str) {
        if let Some(task) = self.inner.write().await.get_mut(&task_id) {
            task.status = TaskStatus::Scraping;
            task.query = Some(query.to_string());
        }
    }

    pub async fn complete(&self, task_id: Uuid, links_found: usize, failed: usize, profiles: Vec<Profile>) {
        if let Some(task) = self.inner.write().await.get_mut(&task_id) {
            task.status = TaskStatus::Completed;
            task.links_found = links_found;
            task.failed = failed;
            task.profiles = profiles;
            task.finished_at = Some(Utc::now());
        }
    }

    pub async fn fail(&self, task_id: Uuid, error: String) {
        if let Some(task) = self.inner.write().await.get_mut(&task_id) {
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            task.finished_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Profile {
        Profile {
            url: format!("https://www.linkedin.com/in/{}", name),
            name: name.to_string(),
            position: "Engineer".into(),
            location: "Remote".into(),
            experience: vec![],
            education: vec![],
        }
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let store = TaskStore::new();
        let id = store.create("data engineers in Canada").await;
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Generating);

        store.start_scraping(id, "site:linkedin.com/in/ \"Data Engineer\"").await;
        let task = store.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Scraping);
        assert_eq!(task.query.as_deref(), Some("site:linkedin.com/in/ \"Data Engineer\""));

        store.complete(id, 4, 3, vec![profile("ana")]).await;
        let task = store.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.links_found, 4);
        assert_eq!(task.failed, 3);
        assert_eq!(task.profiles.len(), 1);
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn failure_records_error() {
        let store = TaskStore::new();
        let id = store.create("x").await;
        store.fail(id, "language model error: HTTP 401".into()).await;
        let task = store.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("language model error: HTTP 401"));
    }

    #[tokio::test]
    async fn unknown_task_is_none() {
        assert!(TaskStore::new().get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = TaskStore::new();
        let first = store.create("first").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create("second").await;

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].task_id, second);
        assert_eq!(list[1].task_id, first);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&TaskStatus::Scraping).unwrap(), "\"scraping\"");
    }
}
