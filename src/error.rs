use thiserror::Error;

/// 第三方错误统一装箱，避免错误类型绑定到具体客户端实现
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 数仓读写错误
    #[error("数仓错误: {0}")]
    Warehouse(#[from] WarehouseError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 提示词模板加载错误
    #[error("提示词错误: {0}")]
    Prompt(#[from] PromptError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 请求校验错误
    #[error("请求错误: {0}")]
    Request(#[from] RequestError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 数仓相关错误
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// 连接数仓失败
    #[error("无法连接到数仓: {source}")]
    ConnectionFailed {
        #[source]
        source: BoxError,
    },
    /// 执行 SQL 失败
    #[error("SQL 执行失败 (表: {table}): {source}")]
    QueryFailed {
        table: String,
        #[source]
        source: BoxError,
    },
    /// 读取结果行失败
    #[error("结果行解析失败 (表: {table}): {source}")]
    RowDecodeFailed {
        table: String,
        #[source]
        source: BoxError,
    },
    /// 嵌套字段序列化失败
    #[error("JSON 列序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 表名不合法
    #[error("表名不合法: '{name}'")]
    InvalidTableName { name: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 构建请求失败
    #[error("构建 LLM 请求失败 (模型: {model}): {source}")]
    RequestBuildFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 提示词模板错误
#[derive(Debug, Error)]
pub enum PromptError {
    /// 网络请求失败
    #[error("下载提示词失败 ({uri}): {source}")]
    FetchFailed {
        uri: String,
        #[source]
        source: BoxError,
    },
    /// 存储服务返回非 2xx
    #[error("下载提示词失败 ({uri}): HTTP {status}")]
    BadStatus { uri: String, status: u16 },
    /// 读取本地文件失败
    #[error("读取提示词文件失败 ({uri}): {source}")]
    ReadFailed {
        uri: String,
        #[source]
        source: BoxError,
    },
    /// 模板内容为空
    #[error("提示词内容为空: {uri}")]
    Empty { uri: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 白名单为空
    #[error("环境变量 {var_name} 解析后白名单为空")]
    EmptyAllowList { var_name: String },
}

/// 请求校验错误
#[derive(Debug, Error)]
pub enum RequestError {
    /// 请求体不是合法 JSON
    #[error("请求体解析失败: {0}")]
    MalformedBody(String),
    /// 字段取值不合法
    #[error("字段 {field} 不合法: {reason}")]
    InvalidField { field: String, reason: String },
    /// 日期格式错误
    #[error("字段 {field} 日期格式错误 (期望 YYYY-MM-DD): '{value}'")]
    InvalidDate { field: String, value: String },
    /// 起止日期颠倒
    #[error("startDate {start} 晚于 endDate {end}")]
    InvertedWindow { start: String, end: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建数仓连接错误
    pub fn warehouse_connection_failed(source: impl Into<BoxError>) -> Self {
        AppError::Warehouse(WarehouseError::ConnectionFailed {
            source: source.into(),
        })
    }

    /// 创建 SQL 执行错误
    pub fn warehouse_query_failed(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AppError::Warehouse(WarehouseError::QueryFailed {
            table: table.into(),
            source: source.into(),
        })
    }

    /// 创建结果行解析错误
    pub fn warehouse_decode_failed(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AppError::Warehouse(WarehouseError::RowDecodeFailed {
            table: table.into(),
            source: source.into(),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(model: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: source.into(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Warehouse(WarehouseError::Serialization(err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
