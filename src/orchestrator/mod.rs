//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! api::ingress (接收请求，后台启动运行)
//!     ↓
//! batch_processor (处理 Vec<Chunk>)
//!     ↓
//! workflow::TranscriptFlow (处理单通电话)
//!     ↓
//! services (能力层：chunk_fetcher / normalizer)
//!     ↓
//! infrastructure / clients (数仓、提示词、LLM)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services → infrastructure
//! 2. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;

pub use batch_processor::{
    BatchOrchestrator, BatchRequest, RunPhase, RunSummary, MAX_CONSECUTIVE_EMPTY_CHUNKS,
};
