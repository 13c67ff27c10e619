/// Workflow identifiers are time-ordered UUIDs (v7).
pub type WorkflowId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
