//! Classification of native column types into generic categories

use crate::schema::GenericType;
use regex::Regex;
use std::sync::LazyLock;

static TYPE_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)").expect("valid regex"));

/// Size metadata reported next to the type name by catalog views
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeSize {
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
}

fn to_u32(n: Option<i64>) -> Option<u32> {
    n.and_then(|n| u32::try_from(n).ok())
}

/// Classify a native type name such as `DECIMAL(10,2)`, `character varying`
/// or `tinyint(1)`
///
/// Arguments in the type name win over `size`. Names outside the generic
/// categories become [`GenericType::Other`].
pub fn classify(native: &str, size: TypeSize) -> GenericType {
    let lower = native.trim().to_ascii_lowercase();
    let head = lower.split('(').next().unwrap_or_default().trim();
    let first_word = head.split_whitespace().next().unwrap_or_default();

    let (arg1, arg2) = match TYPE_ARGS.captures(&lower) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()),
            caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()),
        ),
        None => (None, None),
    };

    let unsigned = lower.split_whitespace().any(|word| word == "unsigned");

    match first_word {
        // SQLite columns declared without a type have no affinity
        "" => GenericType::Binary,
        "tinyint" if arg1 == Some(1) => GenericType::Boolean,
        "bigint" if unsigned => GenericType::Decimal {
            precision: Some(20),
            scale: 0,
        },
        "int" | "integer" | "mediumint" if unsigned => GenericType::BigInt,
        "int" | "integer" | "int2" | "int4" | "smallint" | "mediumint" | "tinyint" | "serial"
        | "smallserial" => GenericType::Integer,
        "bigint" | "int8" | "bigserial" => GenericType::BigInt,
        "decimal" | "numeric" | "number" | "dec" => GenericType::Decimal {
            precision: arg1.or(to_u32(size.precision)),
            scale: arg2.or(to_u32(size.scale)).unwrap_or(0),
        },
        "real" | "float" | "float4" | "float8" | "double" => GenericType::Double,
        "char" | "varchar" | "character" | "nchar" | "nvarchar" | "bpchar" | "varchar2"
        | "nvarchar2" | "varying" => {
            if head.contains("large object") {
                return GenericType::Text;
            }
            match arg1.or(to_u32(size.length)) {
                Some(length) => GenericType::Varchar { length },
                None => GenericType::Text,
            }
        }
        "text" | "clob" | "nclob" | "tinytext" | "mediumtext" | "longtext" | "ntext" => {
            GenericType::Text
        }
        "date" => GenericType::Date,
        "datetime" | "datetime2" | "smalldatetime" | "timestamp" | "timestamptz" => {
            GenericType::DateTime
        }
        "bool" | "boolean" => GenericType::Boolean,
        "bit" if arg1.is_none_or(|n| n == 1) => GenericType::Boolean,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" | "binary" | "varbinary"
        | "image" | "raw" => GenericType::Binary,
        _ => GenericType::Other(native.trim().to_string()),
    }
}
