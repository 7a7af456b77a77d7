//! 数仓能力定义

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppResult;
use crate::models::{ExtractionRow, LedgerEntry, RawModelOutput, Transcript};

/// 转写文本最少词数（按空白分隔）
pub const MIN_WORD_COUNT: usize = 20;

/// 选取过滤条件，来自配置，整个进程内不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFilter {
    pub topic_models: Vec<String>,
    pub lines_of_business: Vec<String>,
    pub like_pattern: String,
    pub min_word_count: usize,
}

/// 一次分块查询
///
/// 日期边界已解析为闭区间，`None` 表示该侧不设限。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub limit: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub filter: TranscriptFilter,
}

/// 数仓（系统记录源）
///
/// 除 `fetch_unprocessed` 外的写操作都只涉及调用方自己的 `call_id`，允许并发交错。
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// 确保原始输出表存在
    async fn ensure_schema(&self) -> AppResult<()>;

    /// 取至多 `query.limit` 条在同一日期分区内尚无原始输出的转写
    async fn fetch_unprocessed(&self, query: &FetchQuery) -> AppResult<Vec<Transcript>>;

    async fn insert_raw_output(&self, output: &RawModelOutput) -> AppResult<()>;

    async fn insert_extraction(&self, row: &ExtractionRow) -> AppResult<()>;

    async fn insert_ledger(&self, entry: &LedgerEntry) -> AppResult<()>;
}
