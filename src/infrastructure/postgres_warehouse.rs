//! 基于 tokio-postgres 的数仓实现
//!
//! 只持有一个共享的 `Client`；tokio-postgres 会在同一连接上流水线化并发请求，
//! 各处理单元的写入互不等待。

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use super::table_name::TableName;
use super::warehouse::{FetchQuery, Warehouse};
use crate::error::{AppError, AppResult};
use crate::models::{ExtractionRow, LedgerEntry, RawModelOutput, Transcript};

/// 四张逻辑表
#[derive(Debug, Clone)]
pub struct WarehouseTables {
    pub transcripts: TableName,
    pub raw_output: TableName,
    pub extractions: TableName,
    pub ledger: TableName,
}

impl WarehouseTables {
    pub fn parse(
        transcripts: &str,
        raw_output: &str,
        extractions: &str,
        ledger: &str,
    ) -> AppResult<Self> {
        Ok(Self {
            transcripts: TableName::parse(transcripts)?,
            raw_output: TableName::parse(raw_output)?,
            extractions: TableName::parse(extractions)?,
            ledger: TableName::parse(ledger)?,
        })
    }
}

pub struct PostgresWarehouse {
    client: Client,
    tables: WarehouseTables,
    fetch_sql: String,
    insert_raw_sql: String,
    insert_extraction_sql: String,
    insert_ledger_sql: String,
}

impl PostgresWarehouse {
    /// 连接数仓，连接驱动放到后台任务
    pub async fn connect(database_url: &str, tables: WarehouseTables) -> AppResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(AppError::warehouse_connection_failed)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("❌ 数仓连接中断: {}", e);
            }
        });
        info!("✓ 已连接数仓");

        Ok(Self {
            fetch_sql: fetch_unprocessed_sql(&tables),
            insert_raw_sql: insert_raw_sql(&tables.raw_output),
            insert_extraction_sql: insert_extraction_sql(&tables.extractions),
            insert_ledger_sql: insert_ledger_sql(&tables.ledger),
            client,
            tables,
        })
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn ensure_schema(&self) -> AppResult<()> {
        let table = self.tables.raw_output.display_name();
        self.client
            .batch_execute(&create_raw_table_sql(&self.tables.raw_output))
            .await
            .map_err(|e| AppError::warehouse_query_failed(&table, e))?;
        debug!("✓ 原始输出表已就绪: {}", table);
        Ok(())
    }

    async fn fetch_unprocessed(&self, query: &FetchQuery) -> AppResult<Vec<Transcript>> {
        let table = self.tables.transcripts.display_name();
        let min_words = i32::try_from(query.filter.min_word_count).unwrap_or(i32::MAX);
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let rows = self
            .client
            .query(
                self.fetch_sql.as_str(),
                &[
                    &query.start,
                    &query.end,
                    &query.filter.topic_models,
                    &query.filter.lines_of_business,
                    &query.filter.like_pattern,
                    &min_words,
                    &limit,
                ],
            )
            .await
            .map_err(|e| AppError::warehouse_query_failed(&table, e))?;

        rows.iter()
            .map(|row| transcript_from_row(row).map_err(|e| AppError::warehouse_decode_failed(&table, e)))
            .collect()
    }

    async fn insert_raw_output(&self, output: &RawModelOutput) -> AppResult<()> {
        self.client
            .execute(
                self.insert_raw_sql.as_str(),
                &[
                    &output.call_id,
                    &output.customer_id,
                    &output.raw_text,
                    &output.model_name,
                    &output.timestamp,
                ],
            )
            .await
            .map_err(|e| AppError::warehouse_query_failed(self.tables.raw_output.display_name(), e))?;
        Ok(())
    }

    async fn insert_extraction(&self, row: &ExtractionRow) -> AppResult<()> {
        let columns = row.json_columns()?;
        let record = &row.record;
        self.client
            .execute(
                self.insert_extraction_sql.as_str(),
                &[
                    &row.call_id,
                    &row.customer_id,
                    &row.line_of_business,
                    &record.interaction_type,
                    &record.incident_classification,
                    &record.failure_origin_channel,
                    &columns.channel_journey,
                    &columns.structured_summary,
                    &columns.financial_summary,
                    &columns.tags,
                    &columns.scores,
                    &row.parsed_on,
                ],
            )
            .await
            .map_err(|e| AppError::warehouse_query_failed(self.tables.extractions.display_name(), e))?;
        Ok(())
    }

    async fn insert_ledger(&self, entry: &LedgerEntry) -> AppResult<()> {
        let batch_number = i32::try_from(entry.batch_number).unwrap_or(i32::MAX);
        let processed = i64::try_from(entry.processed_count).unwrap_or(i64::MAX);
        let failed = i64::try_from(entry.failed_count).unwrap_or(i64::MAX);
        let duration = (entry.duration_seconds * 100.0).round() / 100.0;

        self.client
            .execute(
                self.insert_ledger_sql.as_str(),
                &[
                    &entry.workflow_execution_id,
                    &batch_number,
                    &processed,
                    &failed,
                    &duration,
                    &entry.status.as_str(),
                    &entry.processed_at,
                ],
            )
            .await
            .map_err(|e| AppError::warehouse_query_failed(self.tables.ledger.display_name(), e))?;
        Ok(())
    }
}

fn transcript_from_row(row: &Row) -> Result<Transcript, tokio_postgres::Error> {
    Ok(Transcript {
        call_id: row.try_get("call_id")?,
        customer_id: row.try_get("cust_id")?,
        line_of_business: row.try_get("lob")?,
        transcript_text: row.try_get("transcript_text")?,
    })
}

// ========== SQL ==========

/// 选取未处理转写
///
/// 与原始输出表做反连接：原始输出存在即视为已处理。原始输出只按窗口起点限定，
/// 处理时间总是晚于通话日期，按终点截断会让已处理的通话被反复选中。
/// 参数：$1 起始日期，$2 结束日期，$3 主题模型白名单，$4 业务线白名单，
/// $5 LIKE 模式，$6 最少词数，$7 条数上限。
pub fn fetch_unprocessed_sql(tables: &WarehouseTables) -> String {
    format!(
        r#"
      SELECT
        CAST(t.call_convrstn_id AS TEXT) AS call_id,
        CAST(t.cust_id AS TEXT)          AS cust_id,
        t.lob                            AS lob,
        t.insights_transcript_txt        AS transcript_text
      FROM {transcripts} t
      LEFT JOIN {raw} r
        ON CAST(t.call_convrstn_id AS TEXT) = r.call_convrstn_id
        AND ($1::date IS NULL OR CAST(r.ts AS DATE) >= $1::date)
      WHERE r.call_convrstn_id IS NULL
        AND t.topicmodel = ANY($3::text[])
        AND t.lob = ANY($4::text[])
        AND t.insights_transcript_txt LIKE $5
        AND ($1::date IS NULL OR t.call_convrstn_utc_dt >= $1::date)
        AND ($2::date IS NULL OR t.call_convrstn_utc_dt <= $2::date)
        AND cardinality(regexp_split_to_array(btrim(t.insights_transcript_txt), '\s+')) >= $6::int4
      LIMIT $7::int8
    "#,
        transcripts = tables.transcripts.qualified(),
        raw = tables.raw_output.qualified(),
    )
}

pub fn create_raw_table_sql(raw: &TableName) -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS {raw} (
        call_convrstn_id TEXT,
        cust_id          TEXT,
        model_output     TEXT,
        model_name       TEXT,
        ts               TIMESTAMPTZ
    )
    "#,
        raw = raw.qualified()
    )
}

fn insert_raw_sql(raw: &TableName) -> String {
    format!(
        "INSERT INTO {} (call_convrstn_id, cust_id, model_output, model_name, ts) \
         VALUES ($1, $2, $3, $4, $5)",
        raw.qualified()
    )
}

fn insert_extraction_sql(extractions: &TableName) -> String {
    format!(
        "INSERT INTO {} (\
            call_convrstn_id, cust_id, lob, interaction_type, incident_classification, \
            failure_origin_channel, channel_journey, structured_summary, financial_summary, \
            tags, scores, parsed_on\
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        extractions.qualified()
    )
}

fn insert_ledger_sql(ledger: &TableName) -> String {
    format!(
        "INSERT INTO {} (\
            workflow_execution_id, batch_number, processed_count, failed_count, \
            duration_seconds, status, processed_at\
         ) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        ledger.qualified()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> WarehouseTables {
        WarehouseTables::parse(
            "analytics.transcripts",
            "analytics.raw_output",
            "analytics.call_extractions",
            "processed_ledger",
        )
        .unwrap()
    }

    #[test]
    fn test_fetch_sql_anti_joins_raw_output_from_window_start() {
        let sql = fetch_unprocessed_sql(&tables());
        assert!(sql.contains("FROM \"analytics\".\"transcripts\" t"));
        assert!(sql.contains("LEFT JOIN \"analytics\".\"raw_output\" r"));
        assert!(sql.contains("WHERE r.call_convrstn_id IS NULL"));
        assert!(sql.contains("CAST(r.ts AS DATE) >= $1::date"));
        assert!(sql.contains("t.call_convrstn_utc_dt <= $2::date"));
        assert!(!sql.contains("CAST(r.ts AS DATE) <= $2"));
        assert!(sql.contains("LIMIT $7::int8"));
        // 没有显式排序
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_fetch_sql_applies_every_filter() {
        let sql = fetch_unprocessed_sql(&tables());
        assert!(sql.contains("t.topicmodel = ANY($3::text[])"));
        assert!(sql.contains("t.lob = ANY($4::text[])"));
        assert!(sql.contains("LIKE $5"));
        assert!(sql.contains(r"'\s+'"));
        assert!(sql.contains(">= $6::int4"));
    }

    #[test]
    fn test_insert_statements_target_quoted_tables() {
        let tables = tables();
        assert!(insert_raw_sql(&tables.raw_output)
            .starts_with("INSERT INTO \"analytics\".\"raw_output\""));
        let extraction = insert_extraction_sql(&tables.extractions);
        assert!(extraction.contains("$12"));
        assert!(extraction.contains("financial_summary"));
        assert!(insert_ledger_sql(&tables.ledger).contains("\"processed_ledger\""));
        assert!(create_raw_table_sql(&tables.raw_output).contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_invalid_table_name_is_config_time_error() {
        assert!(WarehouseTables::parse("a.b.c", "raw", "ext", "ledger").is_err());
    }

    /// 需要本地 Postgres：`DATABASE_URL=postgres://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_ensure_schema_against_live_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let warehouse = PostgresWarehouse::connect(&url, tables()).await.unwrap();
        warehouse.ensure_schema().await.unwrap();
    }
}
