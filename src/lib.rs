//! # Call Insight Extract
//!
//! 从客服通话转写中批量抽取结构化洞察（意图、财务影响、评分、标签）的服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 数仓与提示词来源，只暴露能力（trait）
//! - `clients/` - LLM 补全客户端
//!
//! ### ② 业务能力层（Services）
//! - `ChunkFetcher` - 串行取一块未处理转写
//! - `normalizer` - 把模型文本收敛为固定形状的抽取记录（纯函数）
//!
//! ### ③ 流程层（Workflow）
//! - `UnitCtx` - 上下文封装（trace_id + 分块序号 + 单元序号）
//! - `TranscriptFlow` - 单通电话流程（LLM → 原始输出 → 归一化 → 结构化记录）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 分块循环、并发控制、台账
//!
//! ### ⑤ 入口（API）
//! - `api/ingress` - `POST /process` 校验后在后台启动运行
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::{build_state, App};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{BatchOrchestrator, BatchRequest, RunPhase, RunSummary};
pub use services::normalizer::normalize;
pub use workflow::{TranscriptFlow, UnitCtx, UnitOutcome};
