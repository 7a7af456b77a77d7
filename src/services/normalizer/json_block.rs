//! 从模型文本中定位 JSON 对象

use std::sync::OnceLock;

use regex::Regex;

use super::Unparseable;

fn leading_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```(?:json|JSON)?[ \t]*\r?\n").expect("静态正则"))
}

fn trailing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n```\s*$").expect("静态正则"))
}

/// 去掉首尾各一个 markdown 代码围栏（若存在）
pub fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(m) = leading_fence().find(cleaned) {
        cleaned = &cleaned[m.end()..];
    }
    if let Some(m) = trailing_fence().find(cleaned) {
        cleaned = &cleaned[..m.start()];
    }
    cleaned
}

/// 截取第一个 `{` 到最后一个 `}`（含）之间的文本
pub fn extract_json_block(text: &str) -> Result<&str, Unparseable> {
    let cleaned = strip_code_fence(text);
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&cleaned[start..=end]),
        _ => Err(Unparseable::NoJsonObject),
    }
}
