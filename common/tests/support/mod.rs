// In-memory fakes of the store seams shared by the behavioural tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::errors::StorageError;
use common::models::{
    Application, Environment, Listener, Pipeline, Project, Requirement, Schedule,
    ScheduledExecution, WorkerModel,
};
use common::store::{
    ListenerResolver, ProjectResolver, ScheduleStore, ScheduleTransaction, StoreAvailability,
    WorkerModelStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub fn schedule(id: i64, crontab: &str) -> Schedule {
    Schedule {
        id,
        application_id: 1,
        pipeline_id: 1,
        environment_id: 1,
        crontab: crontab.to_string(),
        timezone: String::new(),
        disabled: false,
        args: Vec::new(),
    }
}

pub fn executed_at(schedule_id: i64, id: i64, at: DateTime<Utc>) -> ScheduledExecution {
    ScheduledExecution {
        id,
        executed: true,
        executed_at: Some(at),
        ..ScheduledExecution::planned(schedule_id, at)
    }
}

// ----------------------------------------------------------------------------
// Schedule store
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct ScheduleState {
    pub schedules: Vec<Schedule>,
    /// Committed executions
    pub executions: Vec<ScheduledExecution>,
    pub next_id: i64,
    pub lock_held_elsewhere: bool,
    pub fail_insert_for: Option<i64>,
    pub fail_load_execution_for: Option<i64>,
    pub fail_commit: bool,
    pub commits: usize,
    pub rollbacks: usize,
}

/// Transactional schedule store: inserts become visible on commit only
#[derive(Clone, Default)]
pub struct FakeScheduleStore {
    state: Arc<Mutex<ScheduleState>>,
}

impl FakeScheduleStore {
    pub fn with_schedules(schedules: Vec<Schedule>) -> Self {
        let store = Self::default();
        store.state().schedules = schedules;
        store
    }

    pub fn state(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap()
    }

    pub fn committed(&self) -> Vec<ScheduledExecution> {
        self.state().executions.clone()
    }
}

#[async_trait]
impl ScheduleStore for FakeScheduleStore {
    async fn begin(&self) -> Result<Box<dyn ScheduleTransaction>, StorageError> {
        Ok(Box::new(FakeScheduleTransaction {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }
}

struct FakeScheduleTransaction {
    state: Arc<Mutex<ScheduleState>>,
    pending: Vec<ScheduledExecution>,
}

#[async_trait]
impl ScheduleTransaction for FakeScheduleTransaction {
    async fn try_lock(&mut self, _resource: &str) -> Result<bool, StorageError> {
        Ok(!self.state.lock().unwrap().lock_held_elsewhere)
    }

    async fn load_schedules(&mut self) -> Result<Vec<Schedule>, StorageError> {
        Ok(self.state.lock().unwrap().schedules.clone())
    }

    async fn load_last_execution(
        &mut self,
        schedule_id: i64,
    ) -> Result<Option<ScheduledExecution>, StorageError> {
        let state = self.state.lock().unwrap();
        if state.fail_load_execution_for == Some(schedule_id) {
            return Err(StorageError::DatabaseError("connection reset".to_string()));
        }
        Ok(state
            .executions
            .iter()
            .chain(self.pending.iter())
            .filter(|e| e.schedule_id == schedule_id)
            .max_by_key(|e| e.planned_at)
            .cloned())
    }

    async fn insert_execution(
        &mut self,
        execution: &mut ScheduledExecution,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_insert_for == Some(execution.schedule_id) {
            return Err(StorageError::DatabaseError("insert rejected".to_string()));
        }
        state.next_id += 1;
        execution.id = state.next_id;
        self.pending.push(execution.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let this = *self;
        let mut state = this.state.lock().unwrap();
        if state.fail_commit {
            return Err(StorageError::DatabaseError("commit failed".to_string()));
        }
        state.commits += 1;
        state.executions.extend(this.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Worker model store
// ----------------------------------------------------------------------------

/// Worker model store counting every read
#[derive(Default)]
pub struct CountingWorkerModelStore {
    pub models: Mutex<Vec<WorkerModel>>,
    pub bulk_loads: AtomicUsize,
    pub single_loads: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingWorkerModelStore {
    pub fn with_models(models: Vec<WorkerModel>) -> Self {
        Self {
            models: Mutex::new(models),
            ..Default::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.bulk_loads.load(Ordering::SeqCst) + self.single_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerModelStore for CountingWorkerModelStore {
    async fn load_worker_models(&self) -> Result<Vec<WorkerModel>, StorageError> {
        self.bulk_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("database down".to_string()));
        }
        Ok(self.models.lock().unwrap().clone())
    }

    async fn load_worker_model_capabilities(
        &self,
        model_id: i64,
    ) -> Result<Vec<Requirement>, StorageError> {
        self.single_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("database down".to_string()));
        }
        Ok(self
            .models
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == model_id)
            .map(|m| m.capabilities.clone())
            .unwrap_or_default())
    }
}

pub fn requirement(name: &str, value: &str) -> Requirement {
    Requirement {
        name: name.to_string(),
        requirement_type: "binary".to_string(),
        value: value.to_string(),
    }
}

pub fn worker_model(id: i64, capabilities: Vec<Requirement>) -> WorkerModel {
    WorkerModel {
        id,
        name: format!("model-{}", id),
        capabilities,
    }
}

// ----------------------------------------------------------------------------
// Trigger context
// ----------------------------------------------------------------------------

pub fn listener(uuid: &str) -> Listener {
    Listener {
        uuid: uuid.to_string(),
        application: Application {
            id: 10,
            name: "billing".to_string(),
            project_key: "PAY".to_string(),
        },
        pipeline: Pipeline {
            id: 20,
            name: "deploy".to_string(),
        },
        environment: Environment {
            id: 30,
            name: "production".to_string(),
        },
    }
}

pub fn project(key: &str) -> Project {
    Project {
        id: 1,
        key: key.to_string(),
        name: "Payments".to_string(),
    }
}

/// Listener and project lookups from fixed maps
#[derive(Default)]
pub struct StaticDirectory {
    pub listeners: HashMap<String, Listener>,
    pub projects: HashMap<String, Project>,
}

impl StaticDirectory {
    pub fn with(listeners: Vec<Listener>, projects: Vec<Project>) -> Self {
        Self {
            listeners: listeners.into_iter().map(|l| (l.uuid.clone(), l)).collect(),
            projects: projects.into_iter().map(|p| (p.key.clone(), p)).collect(),
        }
    }
}

#[async_trait]
impl ListenerResolver for StaticDirectory {
    async fn resolve_listener(&self, reference: &str) -> Result<Option<Listener>, StorageError> {
        Ok(self.listeners.get(reference).cloned())
    }
}

#[async_trait]
impl ProjectResolver for StaticDirectory {
    async fn load_project(&self, key: &str) -> Result<Option<Project>, StorageError> {
        Ok(self.projects.get(key).cloned())
    }
}

/// Store availability switch
pub struct Availability(pub AtomicBool);

impl Availability {
    pub fn up() -> Self {
        Self(AtomicBool::new(true))
    }

    pub fn down() -> Self {
        Self(AtomicBool::new(false))
    }
}

#[async_trait]
impl StoreAvailability for Availability {
    async fn is_available(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
