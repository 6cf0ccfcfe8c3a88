// Worker model repository: models and the capabilities they provide

use super::queries::capability_queries;
use crate::db::DbPool;
use crate::errors::{DatabaseError, StorageError};
use crate::models::{Requirement, WorkerModel};
use crate::store::WorkerModelStore;
use async_trait::async_trait;
use sqlx::Row;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::instrument;

/// Repository for worker model database operations
pub struct WorkerModelRepository {
    pool: DbPool,
}

impl WorkerModelRepository {
    /// Create a new WorkerModelRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerModelStore for WorkerModelRepository {
    /// Load every worker model with its capabilities in a single query
    #[instrument(skip(self))]
    async fn load_worker_models(&self) -> Result<Vec<WorkerModel>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT worker_model.id, worker_model.name,
                   worker_capability.name AS capability_name,
                   worker_capability.type AS capability_type,
                   worker_capability.argument AS capability_value
            FROM worker_model
            LEFT JOIN worker_capability ON worker_capability.worker_model_id = worker_model.id
            ORDER BY worker_model.id, worker_capability.name
            "#,
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(DatabaseError::from)?;

        let mut models: BTreeMap<i64, WorkerModel> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let model = match models.entry(id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(WorkerModel {
                    id,
                    name: row.try_get("name")?,
                    capabilities: Vec::new(),
                }),
            };

            // LEFT JOIN yields one NULL capability row for models without any
            let capability_name: Option<String> = row.try_get("capability_name")?;
            if let Some(name) = capability_name {
                model.capabilities.push(Requirement {
                    name,
                    requirement_type: row.try_get("capability_type")?,
                    value: row.try_get("capability_value")?,
                });
            }
        }

        tracing::debug!(count = models.len(), "Loaded worker models");
        Ok(models.into_values().collect())
    }

    #[instrument(skip(self))]
    async fn load_worker_model_capabilities(
        &self,
        model_id: i64,
    ) -> Result<Vec<Requirement>, StorageError> {
        let query = format!(
            "SELECT {} FROM worker_capability WHERE worker_model_id = $1 ORDER BY name",
            capability_queries::SELECT_ALL_COLUMNS
        );

        let requirements = sqlx::query_as::<_, Requirement>(&query)
            .bind(model_id)
            .fetch_all(self.pool.pool())
            .await
            .map_err(DatabaseError::from)?;

        Ok(requirements)
    }
}
