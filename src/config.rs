use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 启动时从环境变量读取一次，缺少必填项直接失败，不进入服务状态。
#[derive(Clone, Debug)]
pub struct Config {
    // --- 服务 ---
    pub bind_host: String,
    pub port: u16,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 数仓 ---
    pub database_url: String,
    pub transcript_table: String,
    pub raw_table: String,
    pub extractions_table: String,
    pub ledger_table: String,
    // --- 选取过滤 ---
    pub topic_models: Vec<String>,
    pub lines_of_business: Vec<String>,
    pub like_pattern: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    // --- 提示词 ---
    pub prompt_uri: String,
    /// 每个分块处理完后等待数仓可见的时间
    pub chunk_cooldown: Duration,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源构建配置（测试时注入 HashMap）
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        Ok(Self {
            bind_host: env.optional("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parsed_or("PORT", 8080, "u16")?,
            verbose_logging: env.parsed_or("VERBOSE_LOGGING", false, "bool")?,
            database_url: env.required("DATABASE_URL")?,
            transcript_table: env.required("TRANSCRIPT_TABLE")?,
            raw_table: env.required("RAW_TABLE")?,
            extractions_table: env.required("CALL_EXTRACTIONS")?,
            ledger_table: env.required("PROCESSED_LEDGER")?,
            topic_models: env.allow_list("TOPIC_MODELS")?,
            lines_of_business: env.allow_list("LOB")?,
            like_pattern: env.required("LIKE_PATTERN")?,
            llm_api_key: env.required("LLM_API_KEY")?,
            llm_api_base_url: env.required("LLM_API_BASE_URL")?,
            llm_model_name: env.required("LLM_MODEL_NAME")?,
            llm_temperature: env.parsed_or("LLM_TEMPERATURE", 0.1, "f32")?,
            llm_max_tokens: env.parsed_or("LLM_MAX_TOKENS", 4000, "u32")?,
            prompt_uri: env.required("PROMPT_URI")?,
            chunk_cooldown: Duration::from_secs(env.parsed_or("CHUNK_COOLDOWN_SECS", 5, "u64")?),
        })
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name).ok_or_else(|| ConfigError::EnvVarNotFound {
            var_name: name.to_string(),
        })
    }

    fn parsed_or<T: FromStr>(
        &self,
        name: &str,
        default: T,
        expected_type: &str,
    ) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        }
    }

    fn allow_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let items = parse_allow_list(&self.required(name)?);
        if items.is_empty() {
            return Err(ConfigError::EmptyAllowList {
                var_name: name.to_string(),
            });
        }
        Ok(items)
    }
}

/// 解析逗号分隔的白名单，兼容 SQL 元组写法 `('a','b')`
pub fn parse_allow_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|item| item.trim().trim_matches('\'').trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/warehouse"),
            ("TRANSCRIPT_TABLE", "analytics.transcripts"),
            ("RAW_TABLE", "analytics.raw_output"),
            ("CALL_EXTRACTIONS", "analytics.call_extractions"),
            ("PROCESSED_LEDGER", "analytics.processed_ledger"),
            ("TOPIC_MODELS", "('billing','outage')"),
            ("LOB", "mobile, internet"),
            ("LIKE_PATTERN", "%agent%"),
            ("LLM_API_KEY", "test-key"),
            ("LLM_API_BASE_URL", "http://localhost:11434/v1"),
            ("LLM_MODEL_NAME", "gpt-4o-mini"),
            ("PROMPT_URI", "prompts/insights.txt"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> AppResult<Config> {
        Config::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied_for_optional_settings() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.chunk_cooldown, Duration::from_secs(5));
        assert_eq!(config.llm_max_tokens, 4000);
        assert!(!config.verbose_logging);
        assert_eq!(config.topic_models, vec!["billing", "outage"]);
        assert_eq!(config.lines_of_business, vec!["mobile", "internet"]);
    }

    #[test]
    fn test_missing_required_setting_fails_fast() {
        let mut env = base_env();
        env.remove("PROMPT_URI");
        let err = load(&env).unwrap_err();
        match err {
            AppError::Config(ConfigError::EnvVarNotFound { var_name }) => {
                assert_eq!(var_name, "PROMPT_URI")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_required_setting_counts_as_missing() {
        let mut env = base_env();
        env.insert("DATABASE_URL", "   ");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_unparseable_optional_setting_is_rejected() {
        let mut env = base_env();
        env.insert("CHUNK_COOLDOWN_SECS", "soon");
        let err = load(&env).unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::EnvVarParseFailed { .. })
        ));
    }

    #[test]
    fn test_empty_allow_list_is_rejected() {
        let mut env = base_env();
        env.insert("LOB", "()");
        let err = load(&env).unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::EmptyAllowList { .. })
        ));
    }

    #[test]
    fn test_parse_allow_list_accepts_plain_and_tuple_forms() {
        assert_eq!(parse_allow_list("a,b"), vec!["a", "b"]);
        assert_eq!(parse_allow_list("('a', 'b')"), vec!["a", "b"]);
        assert_eq!(parse_allow_list(" \"x\" ,, "), vec!["x"]);
        assert!(parse_allow_list("").is_empty());
    }
}
