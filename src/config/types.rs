//! Typed configuration for the extract, load and transform roles

use crate::etl::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default adapter tag for both sources and sinks
pub const DEFAULT_KIND: &str = "database";
/// Default number of rows buffered ahead of the consumer
pub const DEFAULT_FETCH_SIZE: usize = 1000;
/// Default number of rows per committed batch
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// The three configuration roles of a business type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Extract,
    Load,
    Transform,
}

impl Role {
    /// Name of the section holding this role in a configuration file
    pub fn section(&self) -> &'static str {
        match self {
            Role::Extract => "extract",
            Role::Load => "load",
            Role::Transform => "transform",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Source scope and query for a business type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Adapter tag selecting the extractor
    pub kind: String,
    /// Logical database name in the connection registry
    pub database: Option<String>,
    pub catalog: Option<String>,
    pub schema_pattern: Option<String>,
    pub table_pattern: Option<String>,
    /// Query text with `:named` placeholders
    pub sql: Option<String>,
    /// Default placeholder values; caller parameters win
    pub parameters: BTreeMap<String, Value>,
    pub fetch_size: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            kind: DEFAULT_KIND.to_string(),
            database: None,
            catalog: None,
            schema_pattern: None,
            table_pattern: None,
            sql: None,
            parameters: BTreeMap::new(),
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }
}

/// Destination scope and replication settings for a business type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Adapter tag selecting the loader
    pub kind: String,
    pub database: Option<String>,
    pub catalog: Option<String>,
    pub schema_pattern: Option<String>,
    /// Destination table for single-stream loads
    pub table: Option<String>,
    /// Output file for file sinks
    pub path: Option<PathBuf>,
    /// Drop and re-create destination tables before copying
    pub auto_create_table: bool,
    /// Copy row data after DDL
    pub transmit_data: bool,
    /// Worker-pool size for table replication
    pub thread_count: usize,
    pub batch_size: usize,
    /// Upper bound on the wait for replication workers
    pub timeout_secs: Option<u64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            kind: DEFAULT_KIND.to_string(),
            database: None,
            catalog: None,
            schema_pattern: None,
            table: None,
            path: None,
            auto_create_table: false,
            transmit_data: true,
            thread_count: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: None,
        }
    }
}

/// Column mapping rules for a business type
///
/// Columns without a rule pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub columns: Vec<ColumnRule>,
    pub drop_when: Vec<DropCondition>,
}

/// One column mapping rule
///
/// - `source` + `target`: rename in place
/// - `source` + `drop`: remove the column
/// - `target` + `constant`: append a derived column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnRule {
    pub source: Option<String>,
    pub target: Option<String>,
    pub constant: Option<Value>,
    pub drop: bool,
}

/// Drop a record when `column` equals `equals`, or is null when `is_null` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropCondition {
    pub column: String,
    pub equals: Option<Value>,
    pub is_null: bool,
}

/// A resolved configuration of any role
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedConfig {
    Extract(Arc<ExtractConfig>),
    Load(Arc<LoadConfig>),
    Transform(Arc<TransformConfig>),
}

impl ResolvedConfig {
    pub fn role(&self) -> Role {
        match self {
            ResolvedConfig::Extract(_) => Role::Extract,
            ResolvedConfig::Load(_) => Role::Load,
            ResolvedConfig::Transform(_) => Role::Transform,
        }
    }
}

/// Typed configuration of one role
pub trait RoleConfig: DeserializeOwned + Send + Sync + 'static {
    const ROLE: Role;

    /// Check invariants serde cannot express
    fn validate(&self) -> Result<(), String>;

    fn wrap(config: Arc<Self>) -> ResolvedConfig;

    fn unwrap(resolved: &ResolvedConfig) -> Option<Arc<Self>>;
}

impl RoleConfig for ExtractConfig {
    const ROLE: Role = Role::Extract;

    fn validate(&self) -> Result<(), String> {
        if self.fetch_size == 0 {
            return Err("extract.fetch_size must be at least 1".to_string());
        }
        Ok(())
    }

    fn wrap(config: Arc<Self>) -> ResolvedConfig {
        ResolvedConfig::Extract(config)
    }

    fn unwrap(resolved: &ResolvedConfig) -> Option<Arc<Self>> {
        match resolved {
            ResolvedConfig::Extract(c) => Some(c.clone()),
            _ => None,
        }
    }
}

impl RoleConfig for LoadConfig {
    const ROLE: Role = Role::Load;

    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("load.batch_size must be at least 1".to_string());
        }
        Ok(())
    }

    fn wrap(config: Arc<Self>) -> ResolvedConfig {
        ResolvedConfig::Load(config)
    }

    fn unwrap(resolved: &ResolvedConfig) -> Option<Arc<Self>> {
        match resolved {
            ResolvedConfig::Load(c) => Some(c.clone()),
            _ => None,
        }
    }
}

impl RoleConfig for TransformConfig {
    const ROLE: Role = Role::Transform;

    fn validate(&self) -> Result<(), String> {
        for (i, rule) in self.columns.iter().enumerate() {
            match (&rule.source, &rule.target, &rule.constant, rule.drop) {
                (Some(_), _, None, true) => {}
                (Some(_), Some(_), None, false) => {}
                (None, Some(_), Some(_), false) => {}
                _ => {
                    return Err(format!(
                        "transform.columns[{}] must be a rename (source+target), a drop (source+drop) or a constant (target+constant)",
                        i
                    ));
                }
            }
        }
        if let Some(c) = self.drop_when.iter().find(|c| c.column.is_empty()) {
            return Err(format!("transform.drop_when entry {:?} has no column", c));
        }
        Ok(())
    }

    fn wrap(config: Arc<Self>) -> ResolvedConfig {
        ResolvedConfig::Transform(config)
    }

    fn unwrap(resolved: &ResolvedConfig) -> Option<Arc<Self>> {
        match resolved {
            ResolvedConfig::Transform(c) => Some(c.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config: LoadConfig = serde_yaml::from_str("database: warehouse").unwrap();
        assert_eq!(config.kind, "database");
        assert_eq!(config.database.as_deref(), Some("warehouse"));
        assert!(config.transmit_data);
        assert!(!config.auto_create_table);
        assert_eq!(config.thread_count, 1);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<ExtractConfig, _> = serde_yaml::from_str("databse: erp");
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_parameters_are_typed() {
        let config: ExtractConfig = serde_yaml::from_str(
            "sql: SELECT * FROM t WHERE r = :region\nparameters:\n  region: EU\n  limit: 10",
        )
        .unwrap();
        assert_eq!(config.parameters["region"], Value::Text("EU".into()));
        assert_eq!(config.parameters["limit"], Value::Int(10));
    }

    #[test]
    fn test_transform_rule_validation() {
        let good: TransformConfig = serde_yaml::from_str(
            r#"
columns:
  - { source: amount, target: total }
  - { source: secret, drop: true }
  - { target: origin, constant: erp }
"#,
        )
        .unwrap();
        assert!(good.validate().is_ok());

        let bad: TransformConfig =
            serde_yaml::from_str("columns:\n  - { target: orphan }").unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_invalid() {
        let config: LoadConfig = serde_yaml::from_str("batch_size: 0").unwrap();
        assert!(config.validate().is_err());
    }
}
