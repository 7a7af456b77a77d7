//! 通话转写与原始模型输出

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 一通客服通话的转写文本及标识，即一个处理单元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub call_id: String,
    pub customer_id: Option<String>,
    pub line_of_business: Option<String>,
    pub transcript_text: String,
}

/// LLM 原始输出（审计用）
///
/// 每次 LLM 调用成功后无条件写入；该行存在即表示 `call_id` 已处理。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawModelOutput {
    pub call_id: String,
    pub customer_id: Option<String>,
    pub raw_text: String,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
}

/// 选取时间窗口（闭区间）
///
/// 两端都缺省时表示"前一个自然日"；只给一端时另一端不设限。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// 是否为默认窗口（前一天）
    pub fn is_default(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// 以 `today` 为基准解析出实际边界
    pub fn bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        if self.is_default() {
            let yesterday = today.pred_opt().unwrap_or(today);
            return (Some(yesterday), Some(yesterday));
        }
        (self.start, self.end)
    }

    /// 日志 / 响应中展示用，缺省端显示为 "yesterday"
    pub fn describe(&self) -> (String, String) {
        let show = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "yesterday".to_string())
        };
        (show(self.start), show(self.end))
    }
}
