//! 结构化抽取记录
//!
//! LLM 的自由 JSON 经过归一化后必须收敛到这里的固定形状，
//! 未知或缺失的子字段一律为 `null` 或省略，不会原样透传。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一通电话归一化后的抽取结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub interaction_type: Option<String>,
    pub incident_classification: Option<String>,
    pub failure_origin_channel: Option<String>,
    /// 每个渠道步骤各自序列化后的 JSON 文本，保持原有顺序
    #[serde(default)]
    pub channel_journey: Vec<String>,
    #[serde(default)]
    pub structured_summary: StructuredSummary,
    #[serde(default)]
    pub financial_summary: Vec<FinancialImpact>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub scores: Scores,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    #[serde(rename = "Customer_Intent")]
    pub customer_intent: Option<String>,
    #[serde(rename = "Agent_Resolution_Steps")]
    pub agent_resolution_steps: Option<String>,
    #[serde(rename = "Root_Cause")]
    pub root_cause: Option<String>,
    #[serde(rename = "Final_Call_Resolution")]
    pub final_call_resolution: Option<String>,
}

/// 扁平化后的单条财务影响
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub tag: Option<String>,
    pub amount: Option<f64>,
    pub currency: String,
    pub impact_type: String,
    pub duration_months: Option<i64>,
    pub description: Option<String>,
}

/// 标签分类
///
/// 空分类在写出时整体省略；读取时缺失等价于"没有标签"。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_intent_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_tags: Option<Vec<String>>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.customer_intent_tags.is_none()
            && self.agent_tags.is_none()
            && self.operational_tags.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "Customer_Effort_Score")]
    pub customer_effort_score: Option<f64>,
    #[serde(rename = "Issue_Resolution_Score")]
    pub issue_resolution_score: Option<f64>,
    #[serde(rename = "Revenue_Impact_Score")]
    pub revenue_impact_score: Option<f64>,
    #[serde(rename = "Escalation_Risk_Score")]
    pub escalation_risk_score: Option<f64>,
    #[serde(rename = "Agent_Effectiveness_Score")]
    pub agent_effectiveness_score: Option<f64>,
}

/// 待写入数仓的一行抽取结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRow {
    pub call_id: String,
    pub customer_id: Option<String>,
    pub line_of_business: Option<String>,
    pub record: ExtractionRecord,
    pub parsed_on: DateTime<Utc>,
}

/// 嵌套字段序列化后的文本列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionColumns {
    pub channel_journey: String,
    pub structured_summary: String,
    pub financial_summary: String,
    pub tags: String,
    pub scores: String,
}

impl ExtractionRow {
    /// 将对象 / 列表字段转成内嵌 JSON 文本列
    pub fn json_columns(&self) -> Result<ExtractionColumns, serde_json::Error> {
        Ok(ExtractionColumns {
            channel_journey: serde_json::to_string(&self.record.channel_journey)?,
            structured_summary: serde_json::to_string(&self.record.structured_summary)?,
            financial_summary: serde_json::to_string(&self.record.financial_summary)?,
            tags: serde_json::to_string(&self.record.tags)?,
            scores: serde_json::to_string(&self.record.scores)?,
        })
    }
}
