use async_trait::async_trait;
use sea_orm::*;

use crate::entities::task;
use crate::task::Task;

/// Field set used to insert a new task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub completed: bool,
}

/// Partial update of a task row. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub completed_at: Option<String>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    /// Returns `true` when no field would be written.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed_at.is_none()
            && self.completed.is_none()
    }
}

/// Error type for task storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The unique index on `title` rejected the write.
    #[error("A task titled '{0}' already exists")]
    DuplicateTitle(String),
    /// Any other failure reported by the database.
    #[error("Failed to {operation}")]
    Database {
        operation: String,
        #[source]
        source: DbErr,
    },
}

impl StorageError {
    fn from_db(operation: String, title: Option<&str>, source: DbErr) -> Self {
        match (source.sql_err(), title) {
            (Some(SqlErr::UniqueConstraintViolation(_)), Some(title)) => {
                Self::DuplicateTitle(title.to_string())
            }
            _ => Self::Database { operation, source },
        }
    }
}

/// Data access for tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Inserts a task and returns it with its generated ID.
    async fn create(&self, task: TaskDraft) -> Result<Task, StorageError>;

    /// Exact-match lookup by title.
    async fn find_by_title(&self, title: &str) -> Result<Option<Task>, StorageError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Task>, StorageError>;

    /// Returns every task, ordered by ID.
    async fn find_all(&self) -> Result<Vec<Task>, StorageError>;

    /// Applies `changes` and returns the refreshed task.
    ///
    /// Returns `None` when no row has the given ID or when `changes` is empty.
    async fn update(&self, id: i32, changes: TaskChanges) -> Result<Option<Task>, StorageError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i32) -> Result<bool, StorageError>;
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task::new(
            model.id,
            model.title,
            model.description,
            model.created_at,
            model.completed_at,
            model.completed != 0,
        )
    }
}

/// [`TaskRepository`] backed by a SeaORM connection.
pub struct SeaOrmTaskRepository<'a> {
    db: &'a DatabaseConnection,
}

impl SeaOrmTaskRepository<'_> {
    pub fn new(db: &DatabaseConnection) -> SeaOrmTaskRepository<'_> {
        SeaOrmTaskRepository { db }
    }
}

#[async_trait]
impl TaskRepository for SeaOrmTaskRepository<'_> {
    #[tracing::instrument(skip(self))]
    async fn create(&self, draft: TaskDraft) -> Result<Task, StorageError> {
        let title = draft.title.clone();
        let active_model = task::ActiveModel {
            title: ActiveValue::Set(draft.title),
            description: ActiveValue::Set(draft.description),
            created_at: ActiveValue::Set(draft.created_at),
            completed_at: ActiveValue::Set(draft.completed_at),
            completed: ActiveValue::Set(i32::from(draft.completed)),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await.map_err(|err| {
            StorageError::from_db(format!("create task '{}'", title), Some(title.as_str()), err)
        })?;
        Ok(Task::from(created_model))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_title(&self, title: &str) -> Result<Option<Task>, StorageError> {
        let model = task::Entity::find()
            .filter(task::Column::Title.eq(title))
            .one(self.db)
            .await
            .map_err(|err| {
                StorageError::from_db(format!("find task titled '{}'", title), None, err)
            })?;
        Ok(model.map(Task::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> Result<Option<Task>, StorageError> {
        let model = task::Entity::find_by_id(id)
            .one(self.db)
            .await
            .map_err(|err| StorageError::from_db(format!("find task with ID {}", id), None, err))?;
        Ok(model.map(Task::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        let tasks = task::Entity::find()
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await
            .map_err(|err| StorageError::from_db("list tasks".to_string(), None, err))?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    #[tracing::instrument(skip(self))]
    async fn update(&self, id: i32, changes: TaskChanges) -> Result<Option<Task>, StorageError> {
        if changes.is_empty() {
            tracing::debug!("No fields to update for task {}", id);
            return Ok(None);
        }

        let title = changes.title.clone();
        let active_model = task::ActiveModel {
            title: changes.title.map_or(ActiveValue::NotSet, ActiveValue::Set),
            description: changes
                .description
                .map_or(ActiveValue::NotSet, ActiveValue::Set),
            completed_at: changes
                .completed_at
                .map_or(ActiveValue::NotSet, |completed_at| ActiveValue::Set(Some(completed_at))),
            completed: changes
                .completed
                .map_or(ActiveValue::NotSet, |completed| ActiveValue::Set(i32::from(completed))),
            ..Default::default()
        };

        let result = task::Entity::update_many()
            .set(active_model)
            .filter(task::Column::Id.eq(id))
            .exec(self.db)
            .await
            .map_err(|err| {
                StorageError::from_db(format!("update task with ID {}", id), title.as_deref(), err)
            })?;
        tracing::debug!("Update of task {} affected {} row(s)", id, result.rows_affected);

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: i32) -> Result<bool, StorageError> {
        let result = task::Entity::delete_by_id(id)
            .exec(self.db)
            .await
            .map_err(|err| {
                StorageError::from_db(format!("delete task with ID {}", id), None, err)
            })?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_changes_are_detected() {
        assert!(TaskChanges::default().is_empty());
        let changes = TaskChanges {
            description: Some(None),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn converts_integer_flag_to_boolean() {
        let model = task::Model {
            id: 7,
            title: "Buy milk".to_string(),
            description: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            completed_at: Some("2024-01-02T00:00:00Z".to_string()),
            completed: 1,
        };
        let task = Task::from(model);
        assert_eq!(task.id(), 7);
        assert!(task.completed());
        assert_eq!(task.completed_at(), Some("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn storage_error_message_hides_driver_detail() {
        let err = StorageError::from_db(
            "find task with ID 3".to_string(),
            None,
            DbErr::Custom("disk I/O error".to_string()),
        );
        assert_eq!(err.to_string(), "Failed to find task with ID 3");
        assert!(std::error::Error::source(&err).is_some());
    }
}
