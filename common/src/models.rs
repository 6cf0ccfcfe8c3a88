use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Schedule Models
// ============================================================================

/// Schedule is a persisted cron-based trigger definition for a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: i64,
    pub application_id: i64,
    pub pipeline_id: i64,
    pub environment_id: i64,
    pub crontab: String,
    /// IANA timezone name; empty means UTC
    pub timezone: String,
    pub disabled: bool,
    #[sqlx(json)]
    pub args: Vec<Parameter>,
}

/// ScheduledExecution is one planned or completed firing of a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScheduledExecution {
    /// Assigned by the store on insert; zero until then
    pub id: i64,
    pub schedule_id: i64,
    pub planned_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed: bool,
    pub build_version: Option<i64>,
}

impl ScheduledExecution {
    /// A new, not yet executed, execution planned at `planned_at`
    pub fn planned(schedule_id: i64, planned_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            schedule_id,
            planned_at,
            executed_at: None,
            executed: false,
            build_version: None,
        }
    }

    /// Instant the next firing is computed from: the actual fire time when
    /// known, otherwise the planned one.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.executed_at.unwrap_or(self.planned_at)
    }
}

// ============================================================================
// Trigger Models
// ============================================================================

/// TriggerEvent is an inbound, queue-delivered request to run a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub listener_uuid: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

/// Listener binds a trigger source to a pipeline/application/environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub uuid: String,
    pub application: Application,
    pub pipeline: Pipeline,
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub project_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub name: String,
}

/// Parameter is one name/value build parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default = "default_parameter_type")]
    pub param_type: String,
    pub value: String,
}

fn default_parameter_type() -> String {
    "string".to_string()
}

impl Parameter {
    /// String-typed parameter
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: default_parameter_type(),
            value: value.into(),
        }
    }
}

/// VCS metadata extracted from well-known trigger parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsChanges {
    pub hash: Option<String>,
    pub branch: Option<String>,
    pub author: Option<String>,
}

/// Provenance of a pipeline run (who or what started it)
///
/// Runs started from trigger events carry an empty provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerProvenance {
    #[serde(default)]
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_build_id: Option<i64>,
}

/// RunRequest is the single call made into the pipeline-execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub project: Project,
    pub pipeline: Pipeline,
    pub application: Application,
    pub environment: Environment,
    pub trigger: TriggerProvenance,
    pub vcs: VcsChanges,
    pub parameters: Vec<Parameter>,
}

// ============================================================================
// Worker Models
// ============================================================================

/// Requirement is a named capability a worker model satisfies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Requirement {
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub requirement_type: String,
    pub value: String,
}

/// WorkerModel with its full capability list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerModel {
    pub id: i64,
    pub name: String,
    pub capabilities: Vec<Requirement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_planned_execution_is_not_executed() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let execution = ScheduledExecution::planned(3, at);
        assert_eq!(execution.schedule_id, 3);
        assert!(!execution.executed);
        assert!(execution.executed_at.is_none());
        assert_eq!(execution.reference_time(), at);
    }

    #[test]
    fn test_reference_time_prefers_actual_fire_time() {
        let planned = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let fired = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        let mut execution = ScheduledExecution::planned(1, planned);
        execution.executed = true;
        execution.executed_at = Some(fired);
        assert_eq!(execution.reference_time(), fired);
    }

    #[test]
    fn test_trigger_event_tolerates_missing_fields() {
        let event: TriggerEvent = serde_json::from_str(r#"{"payload":{"a":1}}"#).unwrap();
        assert!(event.listener_uuid.is_empty());
        assert_eq!(event.payload.len(), 1);
        assert!(event.received_at.is_none());
    }

    #[test]
    fn test_parameter_type_defaults_to_string() {
        let param: Parameter = serde_json::from_str(r#"{"name":"a","value":"b"}"#).unwrap();
        assert_eq!(param, Parameter::string("a", "b"));
    }
}
