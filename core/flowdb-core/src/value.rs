//! Database-space values
//!
//! `SqlValue`는 SQLite 저장 클래스(NULL/INTEGER/REAL/TEXT/BLOB)와 1:1로 대응합니다.
//! 모델 값은 `From` 구현 또는 [`TypeConverterRegistry`](crate::converter::TypeConverterRegistry)를
//! 통해 이 타입으로 변환된 뒤 SQL 리터럴 또는 바인딩 파라미터가 됩니다.

use crate::error::{FlowError, FlowResult};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;

/// 컬럼/컨버터가 선언하는 저장 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    /// DDL에 쓰이는 타입 이름
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// 데이터베이스 값
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// SQL 리터럴 문자열로 변환
    ///
    /// 문자열은 작은따옴표를 두 번 써서 이스케이프하고, BLOB은 `X'..'` 형식입니다.
    /// 숫자는 로케일과 무관하게 `Display`로 렌더링됩니다.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            // NaN은 SQLite에서 NULL, 무한대는 범위를 넘는 실수 리터럴
            SqlValue::Real(v) if v.is_nan() => "NULL".to_string(),
            SqlValue::Real(v) if v.is_infinite() => {
                if v.is_sign_positive() { "9e999" } else { "-9e999" }.to_string()
            }
            SqlValue::Real(v) => {
                if v.fract() != 0.0 {
                    format!("{v}")
                } else if v.abs() < 1e15 {
                    format!("{v:.1}")
                } else {
                    // 정수 자리만 쓰면 INTEGER로 읽히므로 지수 표기
                    format!("{v:e}")
                }
            }
            SqlValue::Text(v) => escape_string(v),
            SqlValue::Blob(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for b in bytes {
                    out.push_str(&format!("{b:02X}"));
                }
                out.push('\'');
                out
            }
        }
    }

    /// 이 값의 저장 타입 (NULL은 `None`)
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(_) => Some(SqlType::Integer),
            SqlValue::Real(_) => Some(SqlType::Real),
            SqlValue::Text(_) => Some(SqlType::Text),
            SqlValue::Blob(_) => Some(SqlType::Blob),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
        }
    }
}

/// 문자열을 SQL 문자열 리터럴로 이스케이프 (`O'Brien` → `'O''Brien'`)
pub fn escape_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::Integer(v as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(if v { 1 } else { 0 })
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Real(v as f64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            SqlValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

impl FromSql for SqlValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
        })
    }
}

/// 커서 값에서 Rust 타입으로 변환하는 트레이트
pub trait FromSqlValue: Sized {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self>;
}

fn mismatch(column: &str, expected: &str, value: &SqlValue) -> FlowError {
    FlowError::Conversion {
        column: column.to_string(),
        expected: expected.to_string(),
        actual: value.type_name().to_string(),
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Integer(v) => Ok(*v),
            _ => Err(mismatch(column, "INTEGER", value)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Integer(v) => i32::try_from(*v).map_err(|_| mismatch(column, "i32", value)),
            _ => Err(mismatch(column, "INTEGER", value)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Real(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(*v as f64),
            _ => Err(mismatch(column, "REAL", value)),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Integer(v) => Ok(*v != 0),
            _ => Err(mismatch(column, "INTEGER", value)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Text(v) => Ok(v.clone()),
            _ => Err(mismatch(column, "TEXT", value)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        match value {
            SqlValue::Blob(v) => Ok(v.clone()),
            _ => Err(mismatch(column, "BLOB", value)),
        }
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(_column: &str, value: &SqlValue) -> FlowResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(column: &str, value: &SqlValue) -> FlowResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(T::from_sql_value(column, value)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_sql_literal() {
        assert_eq!(SqlValue::Null.to_sql_literal(), "NULL");
        assert_eq!(SqlValue::from(42).to_sql_literal(), "42");
        assert_eq!(SqlValue::from(5i64).to_sql_literal(), "5");
        assert_eq!(SqlValue::from(3.14).to_sql_literal(), "3.14");
        assert_eq!(SqlValue::from(2.0).to_sql_literal(), "2.0");
        assert_eq!(SqlValue::from("hello").to_sql_literal(), "'hello'");
        assert_eq!(SqlValue::from(true).to_sql_literal(), "1");
        assert_eq!(SqlValue::from(false).to_sql_literal(), "0");
        assert_eq!(SqlValue::from(vec![0x0Au8, 0xFF]).to_sql_literal(), "X'0AFF'");
        assert_eq!(SqlValue::from(None::<i32>).to_sql_literal(), "NULL");
    }

    #[test]
    fn test_non_finite_real_literals() {
        assert_eq!(SqlValue::Real(f64::NAN).to_sql_literal(), "NULL");
        assert_eq!(SqlValue::Real(f64::INFINITY).to_sql_literal(), "9e999");
        assert_eq!(SqlValue::Real(f64::NEG_INFINITY).to_sql_literal(), "-9e999");
        assert_eq!(SqlValue::Real(1e20).to_sql_literal(), "1e20");
    }

    #[test]
    fn test_single_quote_escape() {
        assert_eq!(SqlValue::from("O'Brien").to_sql_literal(), "'O''Brien'");
    }

    #[test]
    fn test_from_sql_value() {
        assert_eq!(i64::from_sql_value("a", &SqlValue::Integer(7)).unwrap(), 7);
        assert!(bool::from_sql_value("a", &SqlValue::Integer(1)).unwrap());
        assert_eq!(
            Option::<String>::from_sql_value("a", &SqlValue::Null).unwrap(),
            None
        );
        assert_eq!(f64::from_sql_value("a", &SqlValue::Integer(2)).unwrap(), 2.0);

        let err = String::from_sql_value("name", &SqlValue::Integer(1)).unwrap_err();
        assert!(err.to_string().contains("name"));
        assert!(err.to_string().contains("TEXT"));
    }

    #[test]
    fn test_i32_overflow_is_error() {
        assert!(i32::from_sql_value("n", &SqlValue::Integer(i64::MAX)).is_err());
    }

    proptest! {
        #[test]
        fn escaped_literal_has_balanced_quotes(s in ".*") {
            let literal = SqlValue::from(s.as_str()).to_sql_literal();
            prop_assert!(literal.starts_with('\''));
            prop_assert!(literal.ends_with('\''));
            let inner = &literal[1..literal.len() - 1];
            prop_assert_eq!(inner.replace("''", "'"), s.clone());
            prop_assert_eq!(inner.matches('\'').count() % 2, 0);
        }

        #[test]
        fn integer_literal_round_trips(v in any::<i64>()) {
            let literal = SqlValue::from(v).to_sql_literal();
            prop_assert_eq!(literal.parse::<i64>().unwrap(), v);
        }
    }
}
