//! 字段类型强制转换
//!
//! 所有函数都是全函数：无法识别的输入返回 `None`（必要时记一条 warn），从不报错。

use phf::phf_set;
use serde_json::Value;
use tracing::warn;

/// 占位词（大写、去空白后比较）
static PLACEHOLDERS: phf::Set<&'static str> = phf_set! {
    "N/A",
    "NA",
    "NULL",
    "NONE",
    "NOT APPLICABLE",
    "UNKNOWN",
    "",
};

/// 提示词模板里的占位符被模型原样抄回时的样子
const TEMPLATE_SENTINEL: &str = "[ALL_ALPHANUMERIC_SPECIAL_CHARACTERS]";

/// 只对时长字段视为空值
const ONGOING: &str = "ONGOING";

fn is_placeholder(normalized: &str) -> bool {
    normalized.contains(TEMPLATE_SENTINEL) || PLACEHOLDERS.contains(normalized)
}

fn normalize_token(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// 转为文本
///
/// 字符串原样保留；数字 / 布尔转字符串；列表用 `" | "` 连接（跳过 null）；
/// 对象序列化为紧凑 JSON。
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| coerce_text(Some(item)))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" | "))
            }
        }
        other @ Value::Object(_) => Some(other.to_string()),
    }
}

/// 转为浮点数（金额、评分）
pub fn coerce_number(value: Option<&Value>, field: &str) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let token = normalize_token(s);
            if is_placeholder(&token) {
                return None;
            }
            match token.parse::<f64>() {
                Ok(f) if f.is_finite() => Some(f),
                _ => {
                    warn!(field, value = %s, "⚠️ 无法转换为数字，按 null 处理");
                    None
                }
            }
        }
        _ => None,
    }
}

/// 转为整数月数
///
/// 浮点数向零截断；`ONGOING` 等持续性描述视为空值。
pub fn coerce_duration(value: Option<&Value>, field: &str) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let token = normalize_token(s);
            if token == ONGOING || is_placeholder(&token) {
                return None;
            }
            match token.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(field, value = %s, "⚠️ 无法转换为整数，按 null 处理");
                    None
                }
            }
        }
        _ => None,
    }
}

/// 转为文本列表，丢弃 null 和空白项；非列表视为空
pub fn coerce_text_list(value: Option<&Value>, field: &str) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| coerce_text(Some(item)))
            .filter(|s| !s.trim().is_empty())
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            warn!(field, value = %other, "⚠️ 期望列表，已忽略");
            Vec::new()
        }
    }
}
