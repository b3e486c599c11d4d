//! Named `:placeholder` binding for extract SQL

use super::Value;
use std::collections::BTreeMap;

/// SQL text rewritten to positional placeholders plus the values to bind, in order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite `:name` placeholders into positional ones
///
/// `placeholder` renders the n-th positional marker (1-based) for the target
/// dialect. Text inside single-quoted literals, double-quoted identifiers and
/// `--` comments is copied verbatim, as are `::` casts. A name used twice is
/// bound twice.
///
/// # Errors
/// Returns the name of the first placeholder with no value in `params`
///
/// # Example
/// ```
/// use etl_relay::etl::{bind_named, Value};
/// use std::collections::BTreeMap;
///
/// let params = BTreeMap::from([("region".to_string(), Value::from("EU"))]);
/// let bound = bind_named("SELECT * FROM t WHERE region = :region", &params, |n| format!("${}", n)).unwrap();
/// assert_eq!(bound.sql, "SELECT * FROM t WHERE region = $1");
/// assert_eq!(bound.values, vec![Value::from("EU")]);
/// ```
pub fn bind_named(
    sql: &str,
    params: &BTreeMap<String, Value>,
    placeholder: impl Fn(usize) -> String,
) -> Result<BoundSql, String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .map(|p| i + 1 + p)
                    .unwrap_or(chars.len() - 1);
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&n| n == '\n')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|n| !(n.is_ascii_alphanumeric() || *n == '_'))
                    .map(|p| start + p)
                    .unwrap_or(chars.len());
                let name: String = chars[start..end].iter().collect();
                let value = params.get(&name).ok_or_else(|| name.clone())?;
                values.push(value.clone());
                out.push_str(&placeholder(values.len()));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(BoundSql { sql: out, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn question(_: usize) -> String {
        "?".to_string()
    }

    #[test]
    fn test_repeated_names_bind_twice() {
        let p = params(&[("lo", Value::Int(1)), ("hi", Value::Int(9))]);
        let bound = bind_named(
            "SELECT * FROM t WHERE a > :lo AND a < :hi OR b = :lo",
            &p,
            |n| format!("${}", n),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM t WHERE a > $1 AND a < $2 OR b = $3"
        );
        assert_eq!(
            bound.values,
            vec![Value::Int(1), Value::Int(9), Value::Int(1)]
        );
    }

    #[test]
    fn test_literals_casts_and_comments_untouched() {
        let p = params(&[("id", Value::Int(3))]);
        let sql = "SELECT ':x', \"col:y\", a::text FROM t -- :z\nWHERE id = :id";
        let bound = bind_named(sql, &p, question).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':x', \"col:y\", a::text FROM t -- :z\nWHERE id = ?"
        );
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn test_missing_parameter() {
        let err = bind_named("SELECT * FROM t WHERE r = :region", &BTreeMap::new(), question)
            .unwrap_err();
        assert_eq!(err, "region");
    }

    #[test]
    fn test_no_placeholders() {
        let bound = bind_named("SELECT 1", &BTreeMap::new(), question).unwrap();
        assert_eq!(bound.sql, "SELECT 1");
        assert!(bound.values.is_empty());
    }
}
