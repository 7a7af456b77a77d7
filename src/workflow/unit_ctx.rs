//! 处理单元上下文
//!
//! 封装"我正在处理哪次运行、第几个分块里的第几通电话"这一信息

use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct UnitCtx {
    /// 调用方传入的追踪 ID
    pub trace_id: String,

    /// 分块序号（从1开始，仅用于日志显示）
    pub chunk_number: usize,

    /// 单元在分块中的索引（从1开始）
    pub unit_index: usize,
}

impl UnitCtx {
    pub fn new(trace_id: impl Into<String>, chunk_number: usize, unit_index: usize) -> Self {
        Self {
            trace_id: trace_id.into(),
            chunk_number,
            unit_index,
        }
    }
}

impl Display for UnitCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[运行 {} 分块#{} 单元#{}]",
            self.trace_id, self.chunk_number, self.unit_index
        )
    }
}
