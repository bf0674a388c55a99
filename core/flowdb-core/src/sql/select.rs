//! SELECT base

use crate::sql::clause::NameAlias;
use crate::sql::from::FromClause;
use crate::sql::queriable::{StatementBase, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder, join};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Qualifier {
    #[default]
    None,
    Distinct,
    All,
}

/// 컬럼 목록 모드와 집계 함수(method) 모드는 서로 배타적입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    Columns {
        qualifier: Qualifier,
        columns: Vec<NameAlias>,
    },
    Method {
        name: String,
        arguments: Vec<NameAlias>,
    },
}

/// `SELECT [DISTINCT|ALL] columns` 또는 `SELECT METHOD(args)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    projection: Projection,
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

impl Select {
    /// `SELECT *`
    pub fn new() -> Self {
        Self {
            projection: Projection::Columns {
                qualifier: Qualifier::None,
                columns: Vec::new(),
            },
        }
    }

    pub fn columns<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NameAlias>,
    {
        Self {
            projection: Projection::Columns {
                qualifier: Qualifier::None,
                columns: columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// `SELECT NAME(args)`, 인자가 없으면 `NAME(*)`
    pub fn method<I, C>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NameAlias>,
    {
        Self {
            projection: Projection::Method {
                name: name.into().to_uppercase(),
                arguments: arguments.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn count<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NameAlias>,
    {
        Self::method("COUNT", columns)
    }

    pub fn count_all() -> Self {
        Self::method("COUNT", Vec::<NameAlias>::new())
    }

    pub fn avg(column: &str) -> Self {
        Self::method("AVG", [column])
    }

    pub fn sum(column: &str) -> Self {
        Self::method("SUM", [column])
    }

    pub fn max(column: &str) -> Self {
        Self::method("MAX", [column])
    }

    pub fn min(column: &str) -> Self {
        Self::method("MIN", [column])
    }

    /// DISTINCT로 전환 (method 모드였다면 인자를 컬럼 목록으로 사용)
    pub fn distinct(self) -> Self {
        self.with_qualifier(Qualifier::Distinct)
    }

    pub fn all(self) -> Self {
        self.with_qualifier(Qualifier::All)
    }

    fn with_qualifier(self, qualifier: Qualifier) -> Self {
        let columns = match self.projection {
            Projection::Columns { columns, .. } => columns,
            Projection::Method { arguments, .. } => arguments,
        };
        Self {
            projection: Projection::Columns { qualifier, columns },
        }
    }

    pub fn from(self, table: &str) -> FromClause<Select> {
        FromClause::new(self, table)
    }
}

fn render_columns(columns: &[NameAlias]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        join(columns.iter().map(Query::query), ",")
    }
}

impl Query for Select {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with("SELECT ");
        match &self.projection {
            Projection::Columns { qualifier, columns } => {
                match qualifier {
                    Qualifier::Distinct => {
                        out.append("DISTINCT ");
                    }
                    Qualifier::All => {
                        out.append("ALL ");
                    }
                    Qualifier::None => {}
                }
                out.append(render_columns(columns));
            }
            Projection::Method { name, arguments } => {
                out.append(name)
                    .append_parenthesis_enclosed(render_columns(arguments));
            }
        }
        out.into_query()
    }
}

impl StatementBase for Select {
    fn kind(&self) -> StatementKind {
        StatementKind::Select
    }

    fn counts_rows(&self) -> bool {
        matches!(&self.projection, Projection::Method { name, .. } if name == "COUNT")
    }
}
