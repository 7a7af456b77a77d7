//! 分块选取 - 业务能力层
//!
//! 从数仓取一批尚未处理的转写。取到的分块以 [`ChunkClaim`] 形式返回，
//! 持有期间同一进程内的其他取数调用会等待：调用方在分块处理完、冷却结束后再释放，
//! 下一次取数才能看到本块写入的原始输出。跨进程的并发运行不在保护范围内。

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::{FetchQuery, TranscriptFilter, Warehouse};
use crate::models::{DateWindow, Transcript};

pub struct ChunkFetcher {
    warehouse: Arc<dyn Warehouse>,
    filter: TranscriptFilter,
    guard: Mutex<()>,
}

/// 已选中的一块转写，drop 时释放取数锁
pub struct ChunkClaim<'a> {
    transcripts: Vec<Transcript>,
    _guard: Option<MutexGuard<'a, ()>>,
}

impl ChunkClaim<'_> {
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// 取出转写交给处理单元，锁仍由本对象持有
    pub fn take_transcripts(&mut self) -> Vec<Transcript> {
        std::mem::take(&mut self.transcripts)
    }
}

impl ChunkFetcher {
    pub fn new(warehouse: Arc<dyn Warehouse>, filter: TranscriptFilter) -> Self {
        Self {
            warehouse,
            filter,
            guard: Mutex::new(()),
        }
    }

    /// 取至多 `count` 条未处理转写
    ///
    /// 空分块不是错误，表示当前过滤条件下已无可取数据。
    /// 查询失败时锁随错误一起释放。
    pub async fn claim_chunk(&self, count: usize, window: DateWindow) -> AppResult<ChunkClaim<'_>> {
        if count == 0 {
            return Ok(ChunkClaim {
                transcripts: Vec::new(),
                _guard: None,
            });
        }

        let (start, end) = window.bounds(Utc::now().date_naive());
        let query = FetchQuery {
            limit: count,
            start,
            end,
            filter: self.filter.clone(),
        };

        let guard = self.guard.lock().await;
        debug!("🔒 已获取取数锁，请求 {} 条 ({:?} ~ {:?})", count, start, end);

        let mut transcripts = self.warehouse.fetch_unprocessed(&query).await?;
        // 数仓实现可能不严格遵守 LIMIT
        transcripts.truncate(count);

        info!("📥 取到 {} 条待处理转写 (请求 {} 条)", transcripts.len(), count);
        Ok(ChunkClaim {
            transcripts,
            _guard: Some(guard),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionRow, LedgerEntry, RawModelOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 记录同时进行中的取数调用数
    #[derive(Default)]
    struct SlowWarehouse {
        available: usize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        last_query: std::sync::Mutex<Option<FetchQuery>>,
    }

    #[async_trait]
    impl Warehouse for SlowWarehouse {
        async fn ensure_schema(&self) -> AppResult<()> {
            Ok(())
        }

        async fn fetch_unprocessed(&self, query: &FetchQuery) -> AppResult<Vec<Transcript>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.clone());

            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            // 故意多返回，验证截断
            Ok((0..self.available)
                .map(|i| Transcript {
                    call_id: format!("call-{i}"),
                    customer_id: None,
                    line_of_business: Some("mobile".to_string()),
                    transcript_text: "hello".to_string(),
                })
                .collect())
        }

        async fn insert_raw_output(&self, _output: &RawModelOutput) -> AppResult<()> {
            Ok(())
        }

        async fn insert_extraction(&self, _row: &ExtractionRow) -> AppResult<()> {
            Ok(())
        }

        async fn insert_ledger(&self, _entry: &LedgerEntry) -> AppResult<()> {
            Ok(())
        }
    }

    fn filter() -> TranscriptFilter {
        TranscriptFilter {
            topic_models: vec!["billing".to_string()],
            lines_of_business: vec!["mobile".to_string()],
            like_pattern: "%".to_string(),
            min_word_count: crate::infrastructure::MIN_WORD_COUNT,
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_serialized() {
        let warehouse = Arc::new(SlowWarehouse {
            available: 2,
            ..Default::default()
        });
        let fetcher = Arc::new(ChunkFetcher::new(warehouse.clone(), filter()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move {
                    fetcher.claim_chunk(5, DateWindow::default()).await.map(|c| c.len())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }

        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 4);
        assert_eq!(warehouse.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_is_capped_at_requested_count() {
        let warehouse = Arc::new(SlowWarehouse {
            available: 7,
            ..Default::default()
        });
        let fetcher = ChunkFetcher::new(warehouse.clone(), filter());

        let mut claim = fetcher.claim_chunk(3, DateWindow::default()).await.unwrap();
        assert_eq!(claim.len(), 3);
        assert_eq!(claim.transcripts()[0].call_id, "call-0");
        assert_eq!(claim.take_transcripts().len(), 3);
        assert!(claim.is_empty());
        drop(claim);

        let query = warehouse.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.limit, 3);
        // 默认窗口是前一天，两端相同
        assert!(query.start.is_some());
        assert_eq!(query.start, query.end);
        assert_eq!(query.filter.min_word_count, 20);
    }

    #[tokio::test]
    async fn test_zero_count_skips_warehouse() {
        let warehouse = Arc::new(SlowWarehouse::default());
        let fetcher = ChunkFetcher::new(warehouse.clone(), filter());

        assert!(fetcher.claim_chunk(0, DateWindow::default()).await.unwrap().is_empty());
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_held_claim_blocks_next_fetch_until_dropped() {
        let warehouse = Arc::new(SlowWarehouse {
            available: 1,
            ..Default::default()
        });
        let fetcher = ChunkFetcher::new(warehouse.clone(), filter());

        let first = fetcher.claim_chunk(1, DateWindow::default()).await.unwrap();
        let waiting = tokio::time::timeout(
            Duration::from_millis(50),
            fetcher.claim_chunk(1, DateWindow::default()),
        )
        .await;
        assert!(waiting.is_err(), "锁被持有时第二次取数不应完成");
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 1);

        drop(first);
        let second = fetcher.claim_chunk(1, DateWindow::default()).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_releases_lock() {
        struct BrokenWarehouse;

        #[async_trait]
        impl Warehouse for BrokenWarehouse {
            async fn ensure_schema(&self) -> AppResult<()> {
                Ok(())
            }

            async fn fetch_unprocessed(&self, _query: &FetchQuery) -> AppResult<Vec<Transcript>> {
                Err(crate::error::AppError::warehouse_query_failed("transcripts", "timeout"))
            }

            async fn insert_raw_output(&self, _output: &RawModelOutput) -> AppResult<()> {
                Ok(())
            }

            async fn insert_extraction(&self, _row: &ExtractionRow) -> AppResult<()> {
                Ok(())
            }

            async fn insert_ledger(&self, _entry: &LedgerEntry) -> AppResult<()> {
                Ok(())
            }
        }

        let fetcher = ChunkFetcher::new(Arc::new(BrokenWarehouse), filter());
        assert!(fetcher.claim_chunk(1, DateWindow::default()).await.is_err());
        let retry = tokio::time::timeout(
            Duration::from_millis(50),
            fetcher.claim_chunk(1, DateWindow::default()),
        )
        .await;
        assert!(matches!(retry, Ok(Err(_))));
    }
}
