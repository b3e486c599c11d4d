//! Configuration-driven column mapping
//!
//! Renames, removes and derives columns and filters records, as described
//! by a business type's `transform` section.

use crate::config::{ColumnRule, DropCondition, TransformConfig};
use crate::error::{EtlError, Result};
use crate::etl::{Record, Transformer, Value};

/// Transformer built from a [`TransformConfig`]
///
/// Order of application:
/// 1. `drop_when` conditions, against the incoming column names
/// 2. column rules, in configuration order
///
/// Columns without a rule pass through unchanged. Renamed columns keep their
/// position; constant columns are appended.
///
/// # Example
/// ```
/// use etl_relay::config::TransformConfig;
/// use etl_relay::etl::{Record, Transformer, Value};
/// use etl_relay::transform::ColumnMapper;
///
/// let config: TransformConfig = serde_yaml::from_str(r#"
/// columns:
///   - { source: amt, target: amount }
///   - { target: origin, constant: erp }
/// drop_when:
///   - { column: status, equals: void }
/// "#).unwrap();
/// let mapper = ColumnMapper::new("invoices", &config);
///
/// let record: Record = [("amt", Value::Int(5)), ("status", Value::from("open"))]
///     .into_iter()
///     .collect();
/// let mapped = mapper.transform(record).unwrap().unwrap();
/// assert_eq!(mapped.columns().collect::<Vec<_>>(), vec!["amount", "status", "origin"]);
/// ```
#[derive(Debug, Clone)]
pub struct ColumnMapper {
    context: String,
    rules: Vec<ColumnRule>,
    drop_when: Vec<DropCondition>,
}

impl ColumnMapper {
    /// Mapper for the `transform` section of `business_type`
    pub fn new(business_type: impl Into<String>, config: &TransformConfig) -> Self {
        Self {
            context: format!("column mapping for '{}'", business_type.into()),
            rules: config.columns.clone(),
            drop_when: config.drop_when.clone(),
        }
    }

    fn should_drop(&self, record: &Record) -> bool {
        self.drop_when.iter().any(|condition| {
            let value = record.get(&condition.column);
            if condition.is_null && value.is_none_or(Value::is_null) {
                return true;
            }
            match (&condition.equals, value) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            }
        })
    }
}

impl Transformer for ColumnMapper {
    fn transform(&self, mut record: Record) -> Result<Option<Record>> {
        if self.should_drop(&record) {
            return Ok(None);
        }

        for rule in &self.rules {
            match (&rule.source, &rule.target, &rule.constant) {
                (Some(source), _, _) if rule.drop => {
                    record.remove(source);
                }
                (Some(source), Some(target), None) => {
                    if !record.rename(source, target.clone()) {
                        return Err(EtlError::transform(
                            &self.context,
                            format!("cannot rename missing column '{}' to '{}'", source, target),
                        ));
                    }
                }
                (None, Some(target), Some(constant)) => {
                    record.insert(target.clone(), constant.clone());
                }
                _ => {
                    return Err(EtlError::transform(
                        &self.context,
                        format!("invalid column rule {:?}", rule),
                    ));
                }
            }
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(yaml: &str) -> ColumnMapper {
        let config: TransformConfig = serde_yaml::from_str(yaml).unwrap();
        ColumnMapper::new("orders", &config)
    }

    fn order(status: Value) -> Record {
        [
            ("id", Value::Int(1)),
            ("secret", Value::from("x")),
            ("status", status),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rename_drop_and_constant() {
        let mapper = mapper(
            r#"
columns:
  - { source: id, target: order_id }
  - { source: secret, drop: true }
  - { target: batch, constant: 7 }
"#,
        );
        let out = mapper.transform(order(Value::from("open"))).unwrap().unwrap();
        let columns: Vec<&str> = out.columns().collect();
        assert_eq!(columns, vec!["order_id", "status", "batch"]);
        assert_eq!(out.get("batch"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_drop_when() {
        let mapper = mapper(
            r#"
drop_when:
  - { column: status, equals: void }
  - { column: status, is_null: true }
"#,
        );
        assert!(mapper.transform(order(Value::from("void"))).unwrap().is_none());
        assert!(mapper.transform(order(Value::Null)).unwrap().is_none());
        assert!(mapper.transform(order(Value::from("open"))).unwrap().is_some());
    }

    #[test]
    fn test_missing_rename_source_is_an_error() {
        let mapper = mapper("columns:\n  - { source: nope, target: other }");
        let err = mapper.transform(order(Value::Null)).unwrap_err();
        assert_eq!(err.kind(), "TransformError");
        assert!(err.to_string().contains("'orders'"), "{}", err);
    }

    #[test]
    fn test_unmapped_columns_pass_through() {
        let mapper = mapper("{}");
        let input = order(Value::from("open"));
        assert_eq!(mapper.transform(input.clone()).unwrap(), Some(input));
    }
}
