//! 模型输出归一化 - 业务能力层
//!
//! 把不可信的模型文本（可能带 markdown 围栏、前后夹杂说明文字、甚至根本不是 JSON）
//! 转成固定形状的 [`ExtractionRecord`]，或者明确返回 [`Unparseable`]。
//!
//! 纯函数，不做任何 I/O：同样的输入永远得到同样的结果。
//!
//! ## 步骤
//! 1. 去掉首尾各一个代码围栏
//! 2. 截取第一个 `{` 到最后一个 `}`
//! 3. 解析 JSON（失败不重试，记录首尾片段便于排查）
//! 4. 按别名表逐字段强制转换

pub mod coerce;
pub mod field_alias;
pub mod financial;
pub mod json_block;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{ExtractionRecord, Scores, StructuredSummary, Tags};
use crate::utils::{head_chars, tail_chars};
use coerce::{coerce_number, coerce_text, coerce_text_list};
use field_alias::{get_field, get_object, scores as score_keys, summary, tags as tag_keys, top};

pub use financial::flatten_financial_summary;
pub use json_block::{extract_json_block, strip_code_fence};

/// 无法解析的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unparseable {
    #[error("响应中未找到 JSON 对象")]
    NoJsonObject,
    #[error("JSON 解析失败: {0}")]
    InvalidJson(String),
    #[error("JSON 顶层不是对象")]
    NotAnObject,
}

/// 解析失败时记录的首尾长度
const HEAD_PREVIEW: usize = 500;
const TAIL_PREVIEW: usize = 200;

/// 归一化入口
pub fn normalize(raw_text: &str) -> Result<ExtractionRecord, Unparseable> {
    let object = parse_model_output(raw_text)?;
    Ok(build_record(&object))
}

/// 从模型文本中取出顶层 JSON 对象
pub fn parse_model_output(raw_text: &str) -> Result<Map<String, Value>, Unparseable> {
    let block = match extract_json_block(raw_text) {
        Ok(block) => block,
        Err(reason) => {
            error!("❌ 模型输出中没有 JSON 对象");
            return Err(reason);
        }
    };

    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(object)) => {
            debug!("✅ 模型输出解析成功");
            Ok(object)
        }
        Ok(_) => {
            error!("❌ 模型输出的 JSON 顶层不是对象");
            Err(Unparseable::NotAnObject)
        }
        Err(e) => {
            error!("❌ JSON 解析失败: {}", e);
            error!("原始输出（前 {} 字符）: {}...", HEAD_PREVIEW, head_chars(raw_text, HEAD_PREVIEW));
            error!("原始输出（后 {} 字符）: ...{}", TAIL_PREVIEW, tail_chars(raw_text, TAIL_PREVIEW));
            Err(Unparseable::InvalidJson(e.to_string()))
        }
    }
}

/// 将已解析的顶层对象收敛为固定形状
pub fn build_record(object: &Map<String, Value>) -> ExtractionRecord {
    ExtractionRecord {
        interaction_type: coerce_text(get_field(object, top::INTERACTION_TYPE)),
        incident_classification: coerce_text(get_field(object, top::INCIDENT_CLASSIFICATION)),
        failure_origin_channel: coerce_text(get_field(object, top::FAILURE_ORIGIN_CHANNEL)),
        channel_journey: build_channel_journey(get_field(object, top::CHANNEL_JOURNEY)),
        structured_summary: build_summary(get_object(object, top::STRUCTURED_SUMMARY)),
        financial_summary: flatten_financial_summary(get_object(object, top::FINANCIAL_SUMMARY)),
        tags: build_tags(get_object(object, top::TAGS)),
        scores: build_scores(get_object(object, top::SCORES)),
    }
}

/// 每个渠道步骤单独序列化，保持顺序；null 步骤写为 `"null"`
fn build_channel_journey(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(steps)) => steps.iter().map(Value::to_string).collect(),
        _ => Vec::new(),
    }
}

fn build_summary(summary_obj: Option<&Map<String, Value>>) -> StructuredSummary {
    let Some(obj) = summary_obj else {
        return StructuredSummary::default();
    };
    StructuredSummary {
        customer_intent: coerce_text(get_field(obj, summary::CUSTOMER_INTENT)),
        agent_resolution_steps: coerce_text(get_field(obj, summary::AGENT_RESOLUTION_STEPS)),
        root_cause: coerce_text(get_field(obj, summary::ROOT_CAUSE)),
        final_call_resolution: coerce_text(get_field(obj, summary::FINAL_CALL_RESOLUTION)),
    }
}

/// 构建标签，空分类整体省略
pub fn build_tags(tags_obj: Option<&Map<String, Value>>) -> Tags {
    let Some(obj) = tags_obj else {
        return Tags::default();
    };
    let category = |aliases, field| {
        let items = coerce_text_list(get_field(obj, aliases), field);
        (!items.is_empty()).then_some(items)
    };
    Tags {
        customer_intent_tags: category(tag_keys::CUSTOMER_INTENT_TAGS, "customer_intent_tags"),
        agent_tags: category(tag_keys::AGENT_TAGS, "agent_tags"),
        operational_tags: category(tag_keys::OPERATIONAL_TAGS, "operational_tags"),
    }
}

fn build_scores(scores_obj: Option<&Map<String, Value>>) -> Scores {
    let Some(obj) = scores_obj else {
        return Scores::default();
    };
    let score = |aliases: field_alias::Aliases| coerce_number(get_field(obj, aliases), aliases[0]);
    Scores {
        customer_effort_score: score(score_keys::CUSTOMER_EFFORT),
        issue_resolution_score: score(score_keys::ISSUE_RESOLUTION),
        revenue_impact_score: score(score_keys::REVENUE_IMPACT),
        escalation_risk_score: score(score_keys::ESCALATION_RISK),
        agent_effectiveness_score: score(score_keys::AGENT_EFFECTIVENESS),
    }
}
