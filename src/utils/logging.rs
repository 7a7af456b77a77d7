//! 日志工具模块
//!
//! 提供日志初始化以及格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复调用是安全的（测试中可能多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录服务启动信息
pub fn log_startup(bind_addr: &str, model_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 通话洞察抽取服务启动");
    info!("🌐 监听地址: {}", bind_addr);
    info!("🤖 模型: {}", model_name);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        head_chars(text, max_len) + "..."
    } else {
        text.to_string()
    }
}

/// 取文本开头的 `n` 个字符
pub fn head_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// 取文本末尾的 `n` 个字符
pub fn tail_chars(text: &str, n: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(n)).collect()
}
