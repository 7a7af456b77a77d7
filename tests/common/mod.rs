//! 集成测试用的内存替身

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use call_insight_extract::api::AppState;
use call_insight_extract::clients::CompletionClient;
use call_insight_extract::error::{AppError, AppResult, PromptError};
use call_insight_extract::infrastructure::{FetchQuery, PromptSource, Warehouse};
use call_insight_extract::models::{
    DateWindow, ExtractionRow, LedgerEntry, RawModelOutput, Transcript,
};
use call_insight_extract::{build_state, BatchRequest, Config};
use chrono::NaiveDate;

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 测试统一使用的窗口：起点固定，终点不设限
pub fn test_window() -> DateWindow {
    DateWindow::new(Some(day("2024-01-01")), None)
}

pub fn request(max_records: usize, chunk_size: usize, max_workers: usize) -> BatchRequest {
    BatchRequest {
        trace_id: "test-run".to_string(),
        max_records,
        chunk_size,
        max_workers,
        window: test_window(),
    }
}

/// 一通足够长（超过最少词数）的转写，`marker` 决定脚本化 LLM 的回复
pub fn transcript(call_id: &str, marker: &str) -> Transcript {
    let filler = "the customer called about their monthly bill and asked the agent to review charges";
    Transcript {
        call_id: call_id.to_string(),
        customer_id: Some(format!("cust-{call_id}")),
        line_of_business: Some("mobile".to_string()),
        transcript_text: format!("{marker} {filler} {filler}"),
    }
}

// ========== 数仓 ==========

#[derive(Default)]
pub struct MemoryWarehouse {
    pub transcripts: Vec<(Transcript, NaiveDate)>,
    pub raw: Mutex<Vec<RawModelOutput>>,
    pub extractions: Mutex<Vec<ExtractionRow>>,
    pub ledger: Mutex<Vec<LedgerEntry>>,
    pub fetch_calls: AtomicUsize,
    pub fail_fetch: bool,
    pub fail_schema: bool,
}

impl MemoryWarehouse {
    pub fn with_transcripts(transcripts: Vec<Transcript>) -> Self {
        Self {
            transcripts: transcripts
                .into_iter()
                .map(|t| (t, day("2024-01-02")))
                .collect(),
            ..Default::default()
        }
    }

    pub fn raw_count(&self) -> usize {
        self.raw.lock().unwrap().len()
    }

    pub fn extraction_count(&self) -> usize {
        self.extractions.lock().unwrap().len()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_schema(&self) -> AppResult<()> {
        if self.fail_schema {
            return Err(AppError::warehouse_query_failed("raw_output", "permission denied"));
        }
        Ok(())
    }

    async fn fetch_unprocessed(&self, query: &FetchQuery) -> AppResult<Vec<Transcript>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(AppError::warehouse_query_failed("transcripts", "connection reset"));
        }

        let raw = self.raw.lock().unwrap();
        let processed = |call_id: &str| {
            raw.iter().any(|r| {
                r.call_id == call_id
                    && query.start.map_or(true, |s| r.timestamp.date_naive() >= s)
            })
        };

        Ok(self
            .transcripts
            .iter()
            .filter(|(_, date)| query.start.map_or(true, |s| *date >= s))
            .filter(|(_, date)| query.end.map_or(true, |e| *date <= e))
            .filter(|(t, _)| {
                t.line_of_business
                    .as_ref()
                    .map_or(false, |lob| query.filter.lines_of_business.contains(lob))
            })
            .filter(|(t, _)| t.transcript_text.split_whitespace().count() >= query.filter.min_word_count)
            .filter(|(t, _)| !processed(&t.call_id))
            .take(query.limit)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn insert_raw_output(&self, output: &RawModelOutput) -> AppResult<()> {
        self.raw.lock().unwrap().push(output.clone());
        Ok(())
    }

    async fn insert_extraction(&self, row: &ExtractionRow) -> AppResult<()> {
        self.extractions.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn insert_ledger(&self, entry: &LedgerEntry) -> AppResult<()> {
        self.ledger.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ========== LLM ==========

type Script = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// 按转写内容返回预设回复
pub struct ScriptedLlm {
    script: Script,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub templates: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(script: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            templates: Mutex::new(Vec::new()),
        }
    }

    /// 固定映射：转写以某个 marker 开头时返回对应文本
    pub fn by_marker(replies: HashMap<&'static str, Result<String, String>>) -> Self {
        Self::new(move |text| {
            let marker = text.split_whitespace().next().unwrap_or_default();
            replies
                .get(marker)
                .cloned()
                .unwrap_or_else(|| Ok(r#"{"interaction_type": "Inquiry"}"#.to_string()))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, template: &str, transcript_text: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.templates.lock().unwrap().push(template.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.script)(transcript_text).map_err(AppError::Other)
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

// ========== 提示词 ==========

pub struct StaticPrompt {
    text: Option<String>,
    pub loads: AtomicUsize,
}

impl StaticPrompt {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            text: None,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PromptSource for StaticPrompt {
    async fn load(&self) -> AppResult<String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.text.clone().ok_or_else(|| {
            PromptError::Empty {
                uri: "memory://prompt".to_string(),
            }
            .into()
        })
    }
}

// ========== 装配 ==========

pub fn test_config() -> Config {
    let env = HashMap::from([
        ("DATABASE_URL", "postgres://unused"),
        ("TRANSCRIPT_TABLE", "transcripts"),
        ("RAW_TABLE", "raw_output"),
        ("CALL_EXTRACTIONS", "call_extractions"),
        ("PROCESSED_LEDGER", "processed_ledger"),
        ("TOPIC_MODELS", "billing"),
        ("LOB", "mobile"),
        ("LIKE_PATTERN", "%"),
        ("LLM_API_KEY", "unused"),
        ("LLM_API_BASE_URL", "http://localhost"),
        ("LLM_MODEL_NAME", "scripted-model"),
        ("PROMPT_URI", "memory://prompt"),
        ("CHUNK_COOLDOWN_SECS", "0"),
    ]);
    Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap()
}

pub fn state(
    warehouse: Arc<MemoryWarehouse>,
    llm: Arc<ScriptedLlm>,
    prompt: Arc<StaticPrompt>,
) -> AppState {
    build_state(&test_config(), warehouse, llm, prompt)
}
