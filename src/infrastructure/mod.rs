//! 基础设施层
//!
//! 持有外部资源（数仓连接、HTTP 客户端），只向上暴露能力 trait。

pub mod postgres_warehouse;
pub mod prompt_source;
pub mod table_name;
pub mod warehouse;

pub use postgres_warehouse::{PostgresWarehouse, WarehouseTables};
pub use prompt_source::{PromptSource, UriPromptSource};
pub use table_name::TableName;
pub use warehouse::{FetchQuery, TranscriptFilter, Warehouse, MIN_WORD_COUNT};
