use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

pub mod api;
pub mod repository;
pub mod timestamp;

use repository::{StorageError, TaskChanges, TaskDraft, TaskRepository};

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: i32,
    title: String,
    description: Option<String>,
    created_at: String,
    completed_at: Option<String>,
    completed: bool,
}

impl Task {
    pub fn new(
        id: i32,
        title: String,
        description: Option<String>,
        created_at: String,
        completed_at: Option<String>,
        completed: bool,
    ) -> Self {
        Self {
            id,
            title,
            description,
            created_at,
            completed_at,
            completed,
        }
    }

    /// Returns the ID assigned by storage.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the creation timestamp as stored.
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// Returns the completion timestamp as stored, if any.
    pub fn completed_at(&self) -> Option<&str> {
        self.completed_at.as_deref()
    }

    pub fn completed(&self) -> bool {
        self.completed
    }
}

/// Input for [`TaskService::create_task`].
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Required, trimmed before saving
    pub title: Option<String>,
    pub description: Option<String>,
    /// ISO-8601 timestamp, defaults to the current time
    pub created_at: Option<String>,
    /// ISO-8601 timestamp; validated but never stored for a new task
    pub completed_at: Option<String>,
}

/// Input for [`TaskService::update_task`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub completed_at: Option<String>,
    pub completed: Option<bool>,
}

/// Distinguishes an explicit `null` from a missing field.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Broad category of a [`TaskServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is malformed or incomplete.
    Validation,
    /// The request violates a uniqueness or state rule.
    Conflict,
    /// The storage backend failed.
    Storage,
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Task title is required")]
    TitleRequired,
    #[error("Invalid {field} '{value}'. Use a format such as 'YYYY-MM-DDTHH:mm:ssZ'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("Completion date cannot be earlier than the creation date")]
    CompletedBeforeCreated,
    #[error("A task titled '{0}' already exists")]
    DuplicateTitle(String),
    #[error("Task with ID {0} is already completed")]
    AlreadyCompleted(i32),
    #[error("Task with ID {0} is completed and cannot be reopened")]
    Reopen(i32),
    #[error(transparent)]
    Storage(StorageError),
}

impl TaskServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskServiceError::TitleRequired
            | TaskServiceError::InvalidTimestamp { .. }
            | TaskServiceError::CompletedBeforeCreated => ErrorKind::Validation,
            TaskServiceError::DuplicateTitle(_)
            | TaskServiceError::AlreadyCompleted(_)
            | TaskServiceError::Reopen(_) => ErrorKind::Conflict,
            TaskServiceError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<StorageError> for TaskServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateTitle(title) => TaskServiceError::DuplicateTitle(title),
            other => TaskServiceError::Storage(other),
        }
    }
}

pub struct TaskService<R> {
    repository: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Validates and stores a new task.
    ///
    /// # Arguments
    ///
    /// * `input` - Title, optional description and optional timestamps.
    ///
    /// # Returns
    ///
    /// The created `Task` with its generated ID, `completed == false` and no
    /// completion date.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(&self, input: NewTask) -> Result<Task, TaskServiceError> {
        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or(TaskServiceError::TitleRequired)?
            .to_string();
        if let Some(created_at) = input.created_at.as_deref() {
            ensure_timestamp("createdAt", created_at)?;
        }
        if let Some(completed_at) = input.completed_at.as_deref() {
            ensure_timestamp("completedAt", completed_at)?;
        }

        if self.repository.find_by_title(&title).await?.is_some() {
            return Err(TaskServiceError::DuplicateTitle(title));
        }

        let draft = TaskDraft {
            title,
            description: normalize_description(input.description),
            created_at: input.created_at.unwrap_or_else(timestamp::now),
            completed_at: None,
            completed: false,
        };
        let task = self.repository.create(draft).await?;
        tracing::info!("Created task {} titled '{}'", task.id(), task.title());
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.repository.find_all().await?)
    }

    /// Returns `None` when no task has the given ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, id: i32) -> Result<Option<Task>, TaskServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Applies a partial update to an existing task.
    ///
    /// Setting `completed` without a `completedAt` stamps the current time. The
    /// effective completion date may not precede the creation date, and a new
    /// title must not belong to another task.
    ///
    /// # Returns
    ///
    /// The updated `Task`, or `None` if the task does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        id: i32,
        patch: TaskPatch,
    ) -> Result<Option<Task>, TaskServiceError> {
        let Some(existing) = self.repository.find_by_id(id).await? else {
            tracing::debug!("Task {} not found for update", id);
            return Ok(None);
        };

        if let Some(completed_at) = patch.completed_at.as_deref() {
            ensure_timestamp("completedAt", completed_at)?;
        }
        if existing.completed() && patch.completed == Some(false) {
            return Err(TaskServiceError::Reopen(id));
        }

        let completed_at = match (patch.completed, patch.completed_at) {
            (Some(true), None) => Some(timestamp::now()),
            (_, completed_at) => completed_at,
        };
        if let Some(effective) = completed_at.as_deref().or(existing.completed_at()) {
            ensure_not_before_creation(&existing, effective)?;
        }

        let title = match patch.title {
            Some(title) => self.checked_new_title(&existing, &title).await?,
            None => None,
        };

        let changes = TaskChanges {
            title,
            description: patch.description.map(normalize_description),
            completed_at,
            completed: patch.completed,
        };
        if changes.is_empty() {
            return Ok(Some(existing));
        }

        let updated = self.repository.update(id, changes).await?;
        match &updated {
            Some(task) => tracing::info!("Updated task {}", task.id()),
            None => tracing::warn!("Task {} disappeared before it could be updated", id),
        }
        Ok(updated)
    }

    /// Marks a pending task as completed now.
    ///
    /// # Returns
    ///
    /// The completed `Task`, or `None` if the task does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn complete_task(&self, id: i32) -> Result<Option<Task>, TaskServiceError> {
        let Some(task) = self.repository.find_by_id(id).await? else {
            tracing::debug!("Task {} not found for completion", id);
            return Ok(None);
        };
        if task.completed() {
            return Err(TaskServiceError::AlreadyCompleted(id));
        }

        let completed_at = timestamp::now();
        ensure_not_before_creation(&task, &completed_at)?;

        let changes = TaskChanges {
            completed_at: Some(completed_at),
            completed: Some(true),
            ..Default::default()
        };
        let completed = self.repository.update(id, changes).await?;
        if completed.is_some() {
            tracing::info!("Completed task {}", id);
        }
        Ok(completed)
    }

    /// Returns whether a task was removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: i32) -> Result<bool, TaskServiceError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            tracing::info!("Deleted task {}", id);
        }
        Ok(deleted)
    }

    /// Returns the trimmed title to write, or `None` if it matches the current one.
    async fn checked_new_title(
        &self,
        existing: &Task,
        title: &str,
    ) -> Result<Option<String>, TaskServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskServiceError::TitleRequired);
        }
        if title == existing.title() {
            return Ok(None);
        }
        if let Some(other) = self.repository.find_by_title(title).await? {
            if other.id() != existing.id() {
                return Err(TaskServiceError::DuplicateTitle(title.to_string()));
            }
        }
        Ok(Some(title.to_string()))
    }
}

fn ensure_timestamp(field: &'static str, value: &str) -> Result<(), TaskServiceError> {
    match timestamp::parse(value) {
        Some(_) => Ok(()),
        None => Err(TaskServiceError::InvalidTimestamp {
            field,
            value: value.to_string(),
        }),
    }
}

fn ensure_not_before_creation(task: &Task, completed_at: &str) -> Result<(), TaskServiceError> {
    // Stored creation dates are not re-validated; an unparseable one skips the check.
    match (
        timestamp::parse(task.created_at()),
        timestamp::parse(completed_at),
    ) {
        (Some(created), Some(completed)) if completed < created => {
            Err(TaskServiceError::CompletedBeforeCreated)
        }
        _ => Ok(()),
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty())
}
