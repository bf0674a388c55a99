//! QueryBuilder: SQL 조각 조립기
//!
//! SQL 문법 검증은 하지 않습니다. 순수한 문자열 조립 유틸리티이며
//! 모든 Statement 빌더가 이 위에서 쿼리 텍스트를 만듭니다.

use crate::value::SqlType;
use std::fmt::{self, Display};

/// 쿼리 텍스트를 반환하는 모든 Statement의 공통 트레이트
pub trait Query {
    /// 완성된 SQL 텍스트 (같은 상태에서는 항상 같은 결과)
    fn query(&self) -> String;
}

/// SQL 문자열 버퍼
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    query: String,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(text: impl Display) -> Self {
        let mut builder = Self::new();
        builder.append(text);
        builder
    }

    pub fn append(&mut self, text: impl Display) -> &mut Self {
        use std::fmt::Write;
        let _ = write!(self.query, "{text}");
        self
    }

    pub fn append_space(&mut self) -> &mut Self {
        self.query.push(' ');
        self
    }

    /// `" text "`
    pub fn append_space_separated(&mut self, text: impl Display) -> &mut Self {
        self.append_space().append(text).append_space()
    }

    /// `"(text)"`
    pub fn append_parenthesis_enclosed(&mut self, text: impl Display) -> &mut Self {
        self.append("(").append(text).append(")")
    }

    /// Backtick-quoted identifier
    pub fn append_quoted(&mut self, name: &str) -> &mut Self {
        let quoted = quote_identifier(name);
        self.append(quoted)
    }

    /// `"NAME value "`: value가 비어 있으면 아무것도 추가하지 않음 (GROUP BY/HAVING/LIMIT 등)
    pub fn append_qualifier(&mut self, name: &str, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref();
        if !value.is_empty() {
            self.append(name).append_space().append(value).append_space();
        }
        self
    }

    /// 쉼표로 연결
    pub fn append_array<I, T>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let joined = join(items, ",");
        self.append(joined)
    }

    /// 식별자 목록을 quote 후 쉼표로 연결
    pub fn append_quoted_array<I, T>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let joined = join(names.into_iter().map(|n| quote_identifier(n.as_ref())), ",");
        self.append(joined)
    }

    pub fn append_sql_type(&mut self, sql_type: SqlType) -> &mut Self {
        self.append(sql_type.as_sql())
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    /// Accumulated text with trailing whitespace removed
    pub fn query(&self) -> String {
        self.query.trim_end().to_string()
    }

    pub fn into_query(self) -> String {
        let mut query = self.query;
        query.truncate(query.trim_end().len());
        query
    }
}

impl Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query.trim_end())
    }
}

impl Query for QueryBuilder {
    fn query(&self) -> String {
        QueryBuilder::query(self)
    }
}

/// 식별자를 backtick으로 감쌉니다.
///
/// 이미 quote된 이름과 `*`는 그대로 두고, `table.column`은 각 부분을 따로 감쌉니다.
pub fn quote_identifier(name: &str) -> String {
    if name == "*" || (name.starts_with('`') && name.ends_with('`') && name.len() > 1) {
        return name.to_string();
    }
    name.split('.')
        .map(|part| {
            if part == "*" || (part.starts_with('`') && part.ends_with('`') && part.len() > 1) {
                part.to_string()
            } else {
                format!("`{}`", part.replace('`', "``"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// backtick 제거
pub fn strip_quotes(name: &str) -> &str {
    if name.len() > 1 && name.starts_with('`') && name.ends_with('`') {
        &name[1..name.len() - 1]
    } else {
        name
    }
}

pub fn join<I, T>(items: I, delimiter: &str) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        use std::fmt::Write;
        let _ = write!(out, "{item}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_chain() {
        let mut qb = QueryBuilder::new();
        qb.append("SELECT").append_space().append("*").append_space_separated("FROM");
        qb.append_quoted("users");
        assert_eq!(qb.query(), "SELECT * FROM `users`");
    }

    #[test]
    fn test_qualifier_skips_empty() {
        let mut qb = QueryBuilder::with("SELECT * FROM `t` ");
        qb.append_qualifier("GROUP BY", "").append_qualifier("LIMIT", "5");
        assert_eq!(qb.query(), "SELECT * FROM `t` LIMIT 5");
    }

    #[test]
    fn test_arrays() {
        let mut qb = QueryBuilder::new();
        qb.append_array([1, 2, 3]).append_space().append_quoted_array(["a", "b"]);
        assert_eq!(qb.query(), "1,2,3 `a`,`b`");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name"), "`name`");
        assert_eq!(quote_identifier("`name`"), "`name`");
        assert_eq!(quote_identifier("*"), "*");
        assert_eq!(quote_identifier("u.name"), "`u`.`name`");
        assert_eq!(quote_identifier("u.*"), "`u`.*");
        assert_eq!(strip_quotes("`id`"), "id");
    }

    #[test]
    fn test_parenthesis() {
        let mut qb = QueryBuilder::new();
        qb.append_parenthesis_enclosed("a OR b");
        assert_eq!(qb.into_query(), "(a OR b)");
    }
}
