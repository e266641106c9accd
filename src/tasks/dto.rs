use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::Task;

/// Request body for creating a task.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub completed: Option<bool>,
}

/// Request body for partially updating a task.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            title: t.title,
            completed: t.completed,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_response_serialization() {
        let now = OffsetDateTime::now_utc();
        let response = TaskResponse {
            id: 1,
            title: "Water the plants".into(),
            completed: false,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("Water the plants"));
        assert!(json.contains("\"completed\":false"));
    }

    #[test]
    fn update_request_fields_are_optional() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert!(req.title.is_none());
        assert_eq!(req.completed, Some(true));
    }
}
