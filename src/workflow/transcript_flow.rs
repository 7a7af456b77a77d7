//! 单通电话处理流程 - 流程层
//!
//! 核心职责：定义"一通电话"的完整处理流程
//!
//! 流程顺序：
//! 1. 调用 LLM（模板 + 分隔标记包住的转写）
//! 2. 无条件写入原始输出（已处理标记）
//! 3. 归一化
//! 4. 写入结构化记录
//!
//! 任何一步失败都只影响本单元，结果以 [`UnitOutcome`] 返回，不向外抛错。
//! 单元内不重试。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::clients::CompletionClient;
use crate::error::AppResult;
use crate::infrastructure::Warehouse;
use crate::models::{ExtractionRow, RawModelOutput, Transcript};
use crate::services::normalizer;
use crate::utils::truncate_text;
use crate::workflow::unit_ctx::UnitCtx;

/// 单元处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Success { call_id: String },
    Failed { call_id: String, reason: String },
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Success { .. })
    }

    pub fn call_id(&self) -> &str {
        match self {
            UnitOutcome::Success { call_id } | UnitOutcome::Failed { call_id, .. } => call_id,
        }
    }
}

/// 失败发生在哪一步
enum Failure {
    Llm(String),
    RawWrite(String),
    Unparseable(String),
    ExtractionWrite(String),
}

impl Failure {
    fn into_reason(self) -> String {
        match self {
            Failure::Llm(e) => format!("LLM 调用失败: {e}"),
            Failure::RawWrite(e) => format!("原始输出写入失败: {e}"),
            Failure::Unparseable(e) => format!("模型输出无法解析: {e}"),
            Failure::ExtractionWrite(e) => format!("结构化记录写入失败: {e}"),
        }
    }
}

/// - 编排单通电话的处理步骤
/// - 不持有任何可变状态，多个任务共享同一个实例
pub struct TranscriptFlow {
    llm: Arc<dyn CompletionClient>,
    warehouse: Arc<dyn Warehouse>,
}

impl TranscriptFlow {
    pub fn new(llm: Arc<dyn CompletionClient>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self { llm, warehouse }
    }

    pub async fn run(&self, transcript: &Transcript, prompt: &str, ctx: &UnitCtx) -> UnitOutcome {
        let call_id = transcript.call_id.clone();
        match self.process(transcript, prompt, ctx).await {
            Ok(()) => {
                info!(call_id = %call_id, "{} ✅ 处理完成", ctx);
                UnitOutcome::Success { call_id }
            }
            Err(failure) => {
                let reason = failure.into_reason();
                error!(call_id = %call_id, "{} ❌ {}", ctx, reason);
                UnitOutcome::Failed { call_id, reason }
            }
        }
    }

    async fn process(
        &self,
        transcript: &Transcript,
        prompt: &str,
        ctx: &UnitCtx,
    ) -> Result<(), Failure> {
        // ========== 步骤 1: 调用 LLM ==========
        let raw_text = self
            .llm
            .complete(prompt, &transcript.transcript_text)
            .await
            .map_err(|e| Failure::Llm(e.to_string()))?;
        debug!(call_id = %transcript.call_id, "{} 模型输出: {}", ctx, truncate_text(&raw_text, 200));

        // ========== 步骤 2: 原始输出 ==========
        // 后续解析失败也保留，便于离线补救
        self.write_raw(transcript, &raw_text)
            .await
            .map_err(|e| Failure::RawWrite(e.to_string()))?;

        // ========== 步骤 3: 归一化 ==========
        let record = normalizer::normalize(&raw_text).map_err(|e| {
            warn!(call_id = %transcript.call_id, "{} ⚠️ 原始输出已保存，结构化记录跳过", ctx);
            Failure::Unparseable(e.to_string())
        })?;

        // ========== 步骤 4: 结构化记录 ==========
        let row = ExtractionRow {
            call_id: transcript.call_id.clone(),
            customer_id: transcript.customer_id.clone(),
            line_of_business: transcript.line_of_business.clone(),
            record,
            parsed_on: Utc::now(),
        };
        self.warehouse
            .insert_extraction(&row)
            .await
            .map_err(|e| Failure::ExtractionWrite(e.to_string()))
    }

    async fn write_raw(&self, transcript: &Transcript, raw_text: &str) -> AppResult<()> {
        let output = RawModelOutput {
            call_id: transcript.call_id.clone(),
            customer_id: transcript.customer_id.clone(),
            raw_text: raw_text.to_string(),
            model_name: self.llm.model_name().to_string(),
            timestamp: Utc::now(),
        };
        self.warehouse.insert_raw_output(&output).await
    }
}
