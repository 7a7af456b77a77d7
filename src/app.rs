//! 应用装配
//!
//! 唯一创建外部资源（数仓连接、LLM 客户端、提示词来源）的地方，
//! 其余各层只拿到 trait 对象。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{self, AppState};
use crate::clients::{CompletionClient, OpenAiCompletionClient};
use crate::config::Config;
use crate::infrastructure::{
    PostgresWarehouse, PromptSource, TranscriptFilter, UriPromptSource, Warehouse,
    WarehouseTables, MIN_WORD_COUNT,
};
use crate::orchestrator::BatchOrchestrator;
use crate::services::ChunkFetcher;
use crate::utils::logging;
use crate::workflow::TranscriptFlow;

/// 应用主结构
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let tables = WarehouseTables::parse(
            &config.transcript_table,
            &config.raw_table,
            &config.extractions_table,
            &config.ledger_table,
        )?;
        let warehouse: Arc<dyn Warehouse> =
            Arc::new(PostgresWarehouse::connect(&config.database_url, tables).await?);
        let llm: Arc<dyn CompletionClient> = Arc::new(OpenAiCompletionClient::new(&config));
        let prompt_source: Arc<dyn PromptSource> =
            Arc::new(UriPromptSource::new(config.prompt_uri.clone()));

        let state = build_state(&config, warehouse, llm, prompt_source);
        Ok(Self { config, state })
    }

    /// 运行 HTTP 服务，直到进程退出
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_host, self.config.port)
            .parse()
            .with_context(|| {
                format!("监听地址不合法: {}:{}", self.config.bind_host, self.config.port)
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法绑定 {}", addr))?;

        logging::log_startup(&addr.to_string(), &self.config.llm_model_name);
        axum::serve(listener, api::router(self.state)).await?;
        info!("👋 服务已停止");
        Ok(())
    }
}

/// 按依赖顺序组装各层
pub fn build_state(
    config: &Config,
    warehouse: Arc<dyn Warehouse>,
    llm: Arc<dyn CompletionClient>,
    prompt_source: Arc<dyn PromptSource>,
) -> AppState {
    let filter = TranscriptFilter {
        topic_models: config.topic_models.clone(),
        lines_of_business: config.lines_of_business.clone(),
        like_pattern: config.like_pattern.clone(),
        min_word_count: MIN_WORD_COUNT,
    };
    let fetcher = Arc::new(ChunkFetcher::new(warehouse.clone(), filter));
    let flow = Arc::new(TranscriptFlow::new(llm, warehouse.clone()));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        fetcher,
        flow,
        prompt_source,
        warehouse.clone(),
        config.chunk_cooldown,
    ));

    AppState {
        orchestrator,
        warehouse,
    }
}
