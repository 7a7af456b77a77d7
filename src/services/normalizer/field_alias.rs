//! 字段别名表
//!
//! 模型输出的键名大小写和同义词并不稳定，所有取值都经由
//! [`get_field`] 按这里声明的别名集合查找，不在业务代码里零散匹配。

use serde_json::{Map, Value};

pub type Aliases = &'static [&'static str];

/// 顶层字段
pub mod top {
    use super::Aliases;

    pub const INTERACTION_TYPE: Aliases = &["interaction_type", "Interaction_Type"];
    pub const INCIDENT_CLASSIFICATION: Aliases =
        &["incident_classification", "Incident_Classification"];
    pub const FAILURE_ORIGIN_CHANNEL: Aliases =
        &["failure_origin_channel", "Failure_Origin_Channel"];
    pub const CHANNEL_JOURNEY: Aliases = &["channel_journey", "Channel_Journey"];
    pub const STRUCTURED_SUMMARY: Aliases = &["structured_summary", "Structured_Summary"];
    pub const FINANCIAL_SUMMARY: Aliases = &["financial_summary", "Financial_Summary"];
    pub const TAGS: Aliases = &["tags", "Tags"];
    pub const SCORES: Aliases = &["scores", "Scores"];
}

/// structured_summary 内的四个规范键
pub mod summary {
    use super::Aliases;

    pub const CUSTOMER_INTENT: Aliases = &["Customer_Intent", "customer_intent"];
    pub const AGENT_RESOLUTION_STEPS: Aliases =
        &["Agent_Resolution_Steps", "agent_resolution_steps"];
    pub const ROOT_CAUSE: Aliases = &["Root_Cause", "root_cause"];
    pub const FINAL_CALL_RESOLUTION: Aliases = &[
        "Resolution_Description",
        "resolution_description",
        "Resolution_Status",
        "Final_Call_Resolution",
    ];
}

pub mod tags {
    use super::Aliases;

    pub const CUSTOMER_INTENT_TAGS: Aliases = &["customer_intent_tags"];
    pub const AGENT_TAGS: Aliases = &["agent_tags"];
    pub const OPERATIONAL_TAGS: Aliases = &["operational_tags"];
}

pub mod scores {
    use super::Aliases;

    pub const CUSTOMER_EFFORT: Aliases = &["Customer_Effort_Score"];
    pub const ISSUE_RESOLUTION: Aliases = &["Issue_Resolution_Score"];
    pub const REVENUE_IMPACT: Aliases = &["Revenue_Impact_Score"];
    pub const ESCALATION_RISK: Aliases = &["Escalation_Risk_Score"];
    pub const AGENT_EFFECTIVENESS: Aliases = &["Agent_Effectiveness_Score"];
}

pub mod financial {
    use super::Aliases;

    pub const INCIDENT_CONTEXT: Aliases = &["incident_context"];
    pub const DISPUTED_AMOUNT: Aliases = &["disputed_amount"];
    pub const RESOLUTION_OFFERS: Aliases = &["resolution_offers"];
    pub const OFFER_DETAILS: Aliases = &["offer_details"];
    pub const MRR_IMPACTS: Aliases = &["mrr_impacts", "recurring_impacts"];
    pub const ONE_TIME_IMPACTS: Aliases = &["one_time_impacts"];
    pub const ADMINISTRATIVE_ACTIONS: Aliases = &["administrative_actions"];

    pub const VALUE: Aliases = &["value"];
    pub const TYPE: Aliases = &["type"];
    pub const TAG: Aliases = &["tag"];
    pub const AMOUNT: Aliases = &["amount"];
    pub const MONTHLY_IMPACT: Aliases = &["monthly_impact"];
    pub const DURATION_MONTHS: Aliases = &["duration_months"];
    pub const DESCRIPTION: Aliases = &["description"];
}

/// 按别名集合取字段
///
/// 查找顺序：别名原样 → 别名小写 → 忽略大小写匹配任意键。
/// 键存在但值为 `null` 时返回 `Some(Value::Null)`。
pub fn get_field<'a>(obj: &'a Map<String, Value>, aliases: Aliases) -> Option<&'a Value> {
    for name in aliases {
        if let Some(value) = obj.get(*name) {
            return Some(value);
        }
    }
    for name in aliases {
        if let Some(value) = obj.get(&name.to_lowercase()) {
            return Some(value);
        }
    }
    obj.iter()
        .find(|(key, _)| aliases.iter().any(|alias| key.eq_ignore_ascii_case(alias)))
        .map(|(_, value)| value)
}

/// 取对象字段，非对象（含 null）视为缺失
pub fn get_object<'a>(
    obj: &'a Map<String, Value>,
    aliases: Aliases,
) -> Option<&'a Map<String, Value>> {
    get_field(obj, aliases).and_then(Value::as_object)
}
