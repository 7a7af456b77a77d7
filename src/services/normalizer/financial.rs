//! 财务影响扁平化
//!
//! 模型把财务信息分散在五种形状里，这里按固定顺序拼成一条统一的序列：
//! 争议金额 → 解决方案报价 → 月度经常性影响 → 一次性影响 → 行政操作。

use serde_json::{Map, Value};
use tracing::warn;

use super::coerce::{coerce_duration, coerce_number, coerce_text};
use super::field_alias::{financial as keys, get_field, get_object, Aliases};
use crate::models::FinancialImpact;

/// 币种固定
pub const CURRENCY: &str = "CAD";

pub mod impact_type {
    pub const DISPUTED_AMOUNT_TAG: &str = "disputed_amount";
    pub const UNSPECIFIED: &str = "Unspecified";
    pub const RESOLUTION_OFFER: &str = "resolution_offer";
    pub const MRR_IMPACT: &str = "mrr_impact";
    pub const ONE_TIME_IMPACT: &str = "one_time_impact";
    pub const ADMINISTRATIVE_ACTION: &str = "administrative_action";
}

/// 列表型来源的声明
struct ListCategory {
    source: Aliases,
    /// 条目内再套一层对象时的键（如 `offer_details`）
    nested: Option<Aliases>,
    impact_type: &'static str,
    amount: Aliases,
    /// 只有本身带时长语义的类型才填 `duration_months`
    durational: bool,
}

const LIST_CATEGORIES: [ListCategory; 4] = [
    ListCategory {
        source: keys::RESOLUTION_OFFERS,
        nested: Some(keys::OFFER_DETAILS),
        impact_type: impact_type::RESOLUTION_OFFER,
        amount: keys::MONTHLY_IMPACT,
        durational: true,
    },
    ListCategory {
        source: keys::MRR_IMPACTS,
        nested: None,
        impact_type: impact_type::MRR_IMPACT,
        amount: keys::MONTHLY_IMPACT,
        durational: true,
    },
    ListCategory {
        source: keys::ONE_TIME_IMPACTS,
        nested: None,
        impact_type: impact_type::ONE_TIME_IMPACT,
        amount: keys::AMOUNT,
        durational: false,
    },
    ListCategory {
        source: keys::ADMINISTRATIVE_ACTIONS,
        nested: None,
        impact_type: impact_type::ADMINISTRATIVE_ACTION,
        amount: keys::AMOUNT,
        durational: true,
    },
];

/// 将 `financial_summary` 对象扁平化为统一条目序列
pub fn flatten_financial_summary(financial: Option<&Map<String, Value>>) -> Vec<FinancialImpact> {
    let Some(financial) = financial else {
        return Vec::new();
    };

    let mut records = Vec::new();
    let empty = Map::new();

    if let Some(disputed) = disputed_amount(financial) {
        records.push(disputed);
    }

    for category in &LIST_CATEGORIES {
        let items = match get_field(financial, category.source) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => continue,
            Some(other) => {
                warn!(category = category.impact_type, value = %other, "⚠️ 财务分类不是列表，已跳过");
                continue;
            }
        };

        for item in items {
            let Some(obj) = item.as_object() else {
                warn!(category = category.impact_type, value = %item, "⚠️ 财务条目不是对象，已跳过");
                continue;
            };
            // offer_details 缺失时按空对象处理，条目仍然保留
            let entry = match category.nested {
                Some(nested) => get_object(obj, nested).unwrap_or(&empty),
                None => obj,
            };
            records.push(list_entry(entry, category));
        }
    }

    records
}

fn disputed_amount(financial: &Map<String, Value>) -> Option<FinancialImpact> {
    let context = get_object(financial, keys::INCIDENT_CONTEXT)?;
    match get_field(context, keys::DISPUTED_AMOUNT)? {
        Value::Object(disputed) => {
            let value = get_field(disputed, keys::VALUE).filter(|v| !v.is_null())?;
            Some(FinancialImpact {
                tag: Some(impact_type::DISPUTED_AMOUNT_TAG.to_string()),
                amount: coerce_number(Some(value), "disputed_amount.value"),
                currency: CURRENCY.to_string(),
                impact_type: coerce_text(get_field(disputed, keys::TYPE))
                    .unwrap_or_else(|| impact_type::UNSPECIFIED.to_string()),
                duration_months: None,
                description: coerce_text(get_field(disputed, keys::DESCRIPTION)),
            })
        }
        // 模型偶尔直接给出标量金额
        scalar @ (Value::Number(_) | Value::String(_)) => Some(FinancialImpact {
            tag: Some(impact_type::DISPUTED_AMOUNT_TAG.to_string()),
            amount: coerce_number(Some(scalar), "disputed_amount"),
            currency: CURRENCY.to_string(),
            impact_type: impact_type::UNSPECIFIED.to_string(),
            duration_months: None,
            description: None,
        }),
        _ => None,
    }
}

fn list_entry(entry: &Map<String, Value>, category: &ListCategory) -> FinancialImpact {
    let duration_months = if category.durational {
        coerce_duration(get_field(entry, keys::DURATION_MONTHS), "duration_months")
    } else {
        None
    };

    FinancialImpact {
        tag: coerce_text(get_field(entry, keys::TAG)),
        amount: coerce_number(get_field(entry, category.amount), category.impact_type),
        currency: CURRENCY.to_string(),
        impact_type: category.impact_type.to_string(),
        duration_months,
        description: coerce_text(get_field(entry, keys::DESCRIPTION)),
    }
}
