// SQL query constants for repositories
// Centralizes repeated SELECT column lists

/// SQL query fragments for the pipeline_scheduler table
pub mod schedule_queries {
    /// Columns aliased onto `models::Schedule`
    ///
    /// # NULL Handling
    /// - args: COALESCE to '[]'::jsonb (schedule without parameters)
    /// - timezone: COALESCE to '' (UTC)
    pub const SELECT_ALL_COLUMNS: &str = r#"id, application_id, pipeline_id, environment_id,
        crontab,
        COALESCE(timezone, '') AS timezone,
        disable AS disabled,
        COALESCE(args, '[]'::jsonb) AS args"#;
}

/// SQL query fragments for the pipeline_scheduler_execution table
pub mod execution_queries {
    /// Columns aliased onto `models::ScheduledExecution`
    pub const SELECT_ALL_COLUMNS: &str = r#"id,
        pipeline_scheduler_id AS schedule_id,
        execution_planned_date AS planned_at,
        execution_date AS executed_at,
        executed,
        pipeline_build_version AS build_version"#;
}

/// SQL query fragments for worker capabilities
pub mod capability_queries {
    /// Columns aliased onto `models::Requirement`
    pub const SELECT_ALL_COLUMNS: &str = r#"name, type, argument AS value"#;
}
