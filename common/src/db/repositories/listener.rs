// Listener repository: read-only trigger listener and project configuration

use crate::db::DbPool;
use crate::errors::{DatabaseError, StorageError};
use crate::models::{Application, Environment, Listener, Pipeline, Project};
use crate::store::{ListenerResolver, ProjectResolver};
use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

/// Repository for listener and project lookups
pub struct ListenerRepository {
    pool: DbPool,
}

impl ListenerRepository {
    /// Create a new ListenerRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListenerResolver for ListenerRepository {
    #[instrument(skip(self))]
    async fn resolve_listener(&self, reference: &str) -> Result<Option<Listener>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT trigger_listener.uuid,
                   application.id AS application_id, application.name AS application_name,
                   project.projectkey AS project_key,
                   pipeline.id AS pipeline_id, pipeline.name AS pipeline_name,
                   environment.id AS environment_id, environment.name AS environment_name
            FROM trigger_listener
            JOIN application ON application.id = trigger_listener.application_id
            JOIN project ON project.id = application.project_id
            JOIN pipeline ON pipeline.id = trigger_listener.pipeline_id
            JOIN environment ON environment.id = trigger_listener.environment_id
            WHERE trigger_listener.uuid = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(DatabaseError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Listener {
            uuid: row.try_get("uuid")?,
            application: Application {
                id: row.try_get("application_id")?,
                name: row.try_get("application_name")?,
                project_key: row.try_get("project_key")?,
            },
            pipeline: Pipeline {
                id: row.try_get("pipeline_id")?,
                name: row.try_get("pipeline_name")?,
            },
            environment: Environment {
                id: row.try_get("environment_id")?,
                name: row.try_get("environment_name")?,
            },
        }))
    }
}

#[async_trait]
impl ProjectResolver for ListenerRepository {
    #[instrument(skip(self))]
    async fn load_project(&self, key: &str) -> Result<Option<Project>, StorageError> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, projectkey AS key, name FROM project WHERE projectkey = $1",
        )
        .bind(key)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(DatabaseError::from)?;

        Ok(project)
    }
}
