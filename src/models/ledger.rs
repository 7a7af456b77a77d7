//! 运行台账

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 运行结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// 每次编排运行结束后追加一行，只写不改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub workflow_execution_id: String,
    pub batch_number: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    pub duration_seconds: f64,
    pub status: RunStatus,
    pub processed_at: DateTime<Utc>,
}
