//! 批量编排器 - 编排层
//!
//! ## 职责
//!
//! 驱动一次运行：反复"取一块 → 并发处理 → 等待全部完成"，
//! 直到达到目标条数或数据耗尽，最后写入一行台账。
//!
//! ## 状态流转
//!
//! ```text
//! STARTING → FETCHING → DISPATCHING → (FETCHING | DRAINING) → COMPLETED
//!                    任意阶段出错 → FAILED
//! ```
//!
//! ## 设计特点
//!
//! - **分块屏障**：一块内所有单元完成后才取下一块
//! - **取数互斥**：取数锁从选取一直持有到本块冷却结束，同进程内并发的运行按块轮流
//! - **并发控制**：Semaphore 限制同时运行的单元数，许可在 spawn 之前获取
//! - **计数无序**：单元完成时原子累加，完成顺序不影响结果
//! - **向下委托**：单通电话的细节交给 `workflow::TranscriptFlow`

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{PromptSource, Warehouse};
use crate::models::{DateWindow, LedgerEntry, RunStatus, Transcript};
use crate::services::ChunkFetcher;
use crate::workflow::{TranscriptFlow, UnitCtx};

/// 连续几次取到空块视为数据耗尽
pub const MAX_CONSECUTIVE_EMPTY_CHUNKS: usize = 3;

/// 一次运行的参数（已通过入口校验）
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub trace_id: String,
    pub max_records: usize,
    pub chunk_size: usize,
    pub max_workers: usize,
    pub window: DateWindow,
}

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Starting,
    Fetching,
    Dispatching,
    Draining,
    Completed,
    Failed,
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Starting => "STARTING",
            RunPhase::Fetching => "FETCHING",
            RunPhase::Dispatching => "DISPATCHING",
            RunPhase::Draining => "DRAINING",
            RunPhase::Completed => "COMPLETED",
            RunPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 运行汇总
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub processed_count: usize,
    pub failed_count: usize,
    pub chunks_dispatched: usize,
    pub duration_seconds: f64,
    pub rate_per_second: f64,
    /// 是否因连续空块而结束
    pub exhausted: bool,
    /// 依次经过的阶段
    pub phases: Vec<RunPhase>,
}

/// 单个分块内的计数，由各任务并发累加
#[derive(Debug, Default)]
struct ChunkCounters {
    processed: AtomicUsize,
    failed: AtomicUsize,
}

impl ChunkCounters {
    fn record(&self, success: bool) {
        if success {
            self.processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> ChunkResult {
        ChunkResult {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// 分块处理结果
#[derive(Debug, Default, Clone, Copy)]
struct ChunkResult {
    processed: usize,
    failed: usize,
}

/// 跨分块累计
#[derive(Debug, Default)]
struct RunProgress {
    processed: usize,
    failed: usize,
    chunks: usize,
    phases: Vec<RunPhase>,
}

impl RunProgress {
    fn total(&self) -> usize {
        self.processed + self.failed
    }

    fn enter_phase(&mut self, trace_id: &str, phase: RunPhase) {
        info!(trace_id = %trace_id, phase = %phase, "▶ 进入阶段 {}", phase);
        self.phases.push(phase);
    }
}

pub struct BatchOrchestrator {
    fetcher: Arc<ChunkFetcher>,
    flow: Arc<TranscriptFlow>,
    prompt_source: Arc<dyn PromptSource>,
    warehouse: Arc<dyn Warehouse>,
    chunk_cooldown: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: Arc<ChunkFetcher>,
        flow: Arc<TranscriptFlow>,
        prompt_source: Arc<dyn PromptSource>,
        warehouse: Arc<dyn Warehouse>,
        chunk_cooldown: Duration,
    ) -> Self {
        Self {
            fetcher,
            flow,
            prompt_source,
            warehouse,
            chunk_cooldown,
        }
    }

    /// 执行一次完整运行
    ///
    /// 无论成功与否都会尝试写入台账：成功为 `COMPLETED`，
    /// 编排层错误为 `FAILED`（携带已完成的计数），随后原样返回错误。
    pub async fn run(&self, request: BatchRequest) -> AppResult<RunSummary> {
        let started = Instant::now();
        let mut progress = RunProgress::default();
        log_run_start(&request);

        let outcome = self.drive(&request, &mut progress).await;
        let elapsed = round2(started.elapsed().as_secs_f64());

        match outcome {
            Ok(exhausted) => {
                progress.enter_phase(&request.trace_id, RunPhase::Completed);
                let summary = RunSummary {
                    processed_count: progress.processed,
                    failed_count: progress.failed,
                    chunks_dispatched: progress.chunks,
                    duration_seconds: elapsed,
                    rate_per_second: rate(progress.processed, elapsed),
                    exhausted,
                    phases: progress.phases.clone(),
                };
                print_final_stats(&request, &summary);
                self.write_ledger(&request.trace_id, &progress, elapsed, RunStatus::Completed)
                    .await;
                Ok(summary)
            }
            Err(e) => {
                progress.enter_phase(&request.trace_id, RunPhase::Failed);
                error!(trace_id = %request.trace_id, "❌ 运行中止: {}", e);
                self.write_ledger(&request.trace_id, &progress, elapsed, RunStatus::Failed)
                    .await;
                Err(e)
            }
        }
    }

    /// 主循环，返回是否因数据耗尽结束
    async fn drive(&self, request: &BatchRequest, progress: &mut RunProgress) -> AppResult<bool> {
        progress.enter_phase(&request.trace_id, RunPhase::Starting);
        // 整次运行只读一次模板
        let prompt: Arc<str> = Arc::from(self.prompt_source.load().await?);
        let semaphore = Arc::new(Semaphore::new(
            request.max_workers.clamp(1, Semaphore::MAX_PERMITS),
        ));
        let mut consecutive_empty = 0;

        while progress.total() < request.max_records {
            progress.enter_phase(&request.trace_id, RunPhase::Fetching);
            let remaining = request.max_records - progress.total();
            let chunk_size = request.chunk_size.min(remaining);

            // 取数锁一直持有到本块处理完、冷却结束
            let mut claim = self.fetcher.claim_chunk(chunk_size, request.window).await?;
            if claim.is_empty() {
                consecutive_empty += 1;
                warn!(
                    trace_id = %request.trace_id,
                    "⚠️ 取到空块 ({}/{})",
                    consecutive_empty,
                    MAX_CONSECUTIVE_EMPTY_CHUNKS
                );
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_CHUNKS {
                    progress.enter_phase(&request.trace_id, RunPhase::Draining);
                    info!(trace_id = %request.trace_id, "✅ 没有更多待处理记录");
                    return Ok(true);
                }
                continue;
            }
            consecutive_empty = 0;
            progress.chunks += 1;

            progress.enter_phase(&request.trace_id, RunPhase::Dispatching);
            log_chunk_start(progress.chunks, claim.len(), request);
            let result = self
                .dispatch_chunk(
                    claim.take_transcripts(),
                    progress.chunks,
                    request,
                    prompt.clone(),
                    semaphore.clone(),
                )
                .await?;

            progress.processed += result.processed;
            progress.failed += result.failed;
            log_chunk_complete(progress.chunks, &result, progress.total(), request.max_records);

            if !self.chunk_cooldown.is_zero() {
                info!("⏳ 等待 {:?} 让数仓写入可见...", self.chunk_cooldown);
                tokio::time::sleep(self.chunk_cooldown).await;
            }
            drop(claim);
        }

        progress.enter_phase(&request.trace_id, RunPhase::Draining);
        info!(trace_id = %request.trace_id, "✅ 已达到目标条数 {}", request.max_records);
        Ok(false)
    }

    /// 并发处理一个分块，全部完成后返回
    async fn dispatch_chunk(
        &self,
        chunk: Vec<Transcript>,
        chunk_number: usize,
        request: &BatchRequest,
        prompt: Arc<str>,
        semaphore: Arc<Semaphore>,
    ) -> AppResult<ChunkResult> {
        let counters = Arc::new(ChunkCounters::default());
        let mut handles = Vec::with_capacity(chunk.len());

        for (idx, transcript) in chunk.into_iter().enumerate() {
            let unit_index = idx + 1;
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("工作池已关闭: {e}")))?;

            let flow = self.flow.clone();
            let prompt = prompt.clone();
            let counters_clone = counters.clone();
            let ctx = UnitCtx::new(request.trace_id.clone(), chunk_number, unit_index);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = flow.run(&transcript, &prompt, &ctx).await;
                counters_clone.record(outcome.is_success());
            });
            handles.push((unit_index, handle));
        }

        // 分块屏障：等待本块所有任务完成
        let (indices, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (unit_index, joined) in indices.into_iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                error!(
                    trace_id = %request.trace_id,
                    chunk = chunk_number,
                    "[单元 {}] 任务执行失败: {}",
                    unit_index,
                    e
                );
                counters.record(false);
            }
        }

        Ok(counters.snapshot())
    }

    /// 写台账失败只记录日志，不改变运行结果
    async fn write_ledger(
        &self,
        trace_id: &str,
        progress: &RunProgress,
        duration_seconds: f64,
        status: RunStatus,
    ) {
        let entry = LedgerEntry {
            workflow_execution_id: trace_id.to_string(),
            batch_number: progress.chunks,
            processed_count: progress.processed,
            failed_count: progress.failed,
            duration_seconds,
            status,
            processed_at: Utc::now(),
        };
        match self.warehouse.insert_ledger(&entry).await {
            Ok(()) => info!(trace_id = %trace_id, "📒 台账已写入 ({})", status.as_str()),
            Err(e) => error!(trace_id = %trace_id, "❌ 台账写入失败: {}", e),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rate(processed: usize, seconds: f64) -> f64 {
    if seconds > 0.0 {
        round2(processed as f64 / seconds)
    } else {
        0.0
    }
}

// ========== 日志辅助函数 ==========

fn log_run_start(request: &BatchRequest) {
    let (start, end) = request.window.describe();
    info!("{}", "=".repeat(60));
    info!("🚀 批量模式启动 | 追踪ID: {}", request.trace_id);
    info!(
        "📊 并发数: {} | 目标条数: {} | 分块大小: {}",
        request.max_workers, request.max_records, request.chunk_size
    );
    info!("📅 日期范围: {} ~ {}", start, end);
    info!("{}", "=".repeat(60));
}

fn log_chunk_start(chunk_number: usize, size: usize, request: &BatchRequest) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {} 块: {} 条记录", chunk_number, size);
    info!("📋 最大并发: {}", request.max_workers);
    info!("{}", "=".repeat(60));
}

fn log_chunk_complete(chunk_number: usize, result: &ChunkResult, total: usize, target: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 块完成: 成功 {} | 失败 {} | 累计 {}/{}",
        chunk_number, result.processed, result.failed, total, target
    );
    info!("{}", "─".repeat(60));
}

fn print_final_stats(request: &BatchRequest, summary: &RunSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批量处理完成 | 追踪ID: {}", request.trace_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}", summary.processed_count);
    info!("❌ 失败: {}", summary.failed_count);
    info!("📦 分块数: {}", summary.chunks_dispatched);
    info!(
        "⏱️ 耗时: {:.1} 分钟 | 速率: {:.1} 条/秒",
        summary.duration_seconds / 60.0,
        summary.rate_per_second
    );
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_are_upper_case() {
        assert_eq!(RunPhase::Draining.to_string(), "DRAINING");
        assert_eq!(RunPhase::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn test_rate_and_rounding() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(rate(10, 4.0), 2.5);
        assert_eq!(rate(10, 0.0), 0.0);
    }

    #[test]
    fn test_counters_accumulate_from_many_tasks() {
        let counters = Arc::new(ChunkCounters::default());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let counters = counters.clone();
                std::thread::spawn(move || counters.record(i % 4 != 0))
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let result = counters.snapshot();
        assert_eq!(result.processed, 6);
        assert_eq!(result.failed, 2);
    }
}
