//! 表名标识符

use crate::error::WarehouseError;

/// 可带 schema 前缀的表名，拼接 SQL 时逐段加引号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    /// 解析 `schema.table` 或 `table`
    pub fn parse(raw: &str) -> Result<Self, WarehouseError> {
        let invalid = || WarehouseError::InvalidTableName {
            name: raw.to_string(),
        };
        let parts: Vec<&str> = raw.trim().split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [table] => Ok(Self {
                schema: None,
                table: table.to_string(),
            }),
            [schema, table] => Ok(Self {
                schema: Some(schema.to_string()),
                table: table.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// 带引号的完整引用
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    /// 日志里显示用
    pub fn display_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }
}

/// 给标识符加双引号，转义内部引号
pub fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_qualified_name() {
        let table = TableName::parse("analytics.raw_output").unwrap();
        assert_eq!(table.qualified(), "\"analytics\".\"raw_output\"");
        assert_eq!(table.display_name(), "analytics.raw_output");
    }

    #[test]
    fn test_parse_bare_name_and_escape_quotes() {
        let table = TableName::parse("we\"ird").unwrap();
        assert_eq!(table.qualified(), "\"we\"\"ird\"");
    }

    #[test]
    fn test_reject_empty_or_deep_names() {
        assert!(TableName::parse("").is_err());
        assert!(TableName::parse("a..b").is_err());
        assert!(TableName::parse("a.b.c").is_err());
    }
}
