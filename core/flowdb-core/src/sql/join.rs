//! JOIN 절

use crate::sql::condition::{ConditionGroup, Predicate};
use crate::sql::from::FromClause;
use crate::sql::queriable::StatementBase;
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};

/// 조인 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    /// `LEFT OUTER` (SQLite에서 `OUTER`만 단독으로는 쓸 수 없음)
    LeftOuter,
    Left,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::LeftOuter => "LEFT OUTER",
            JoinKind::Left => "LEFT",
            JoinKind::Cross => "CROSS",
        }
    }
}

#[derive(Debug, Clone)]
enum JoinConstraint {
    None,
    On(ConditionGroup),
    Using(Vec<String>),
}

/// `[NATURAL] <kind> JOIN table [AS alias] [ON ... | USING (...)]`
#[derive(Debug, Clone)]
pub struct Join {
    kind: JoinKind,
    natural: bool,
    table: String,
    alias: Option<String>,
    constraint: JoinConstraint,
}

impl Join {
    pub(crate) fn new(kind: JoinKind, table: &str) -> Self {
        Self {
            kind,
            natural: false,
            table: table.to_string(),
            alias: None,
            constraint: JoinConstraint::None,
        }
    }

    pub(crate) fn natural(mut self) -> Self {
        self.natural = true;
        self
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Query for Join {
    fn query(&self) -> String {
        let mut out = QueryBuilder::new();
        if self.natural {
            out.append("NATURAL ");
        }
        out.append(self.kind.as_sql()).append(" JOIN ").append_quoted(&self.table);
        if let Some(alias) = &self.alias {
            out.append(" AS ").append(quote_identifier(alias));
        }
        match &self.constraint {
            JoinConstraint::None => {}
            JoinConstraint::On(group) => {
                out.append(" ON ").append(group.query());
            }
            JoinConstraint::Using(columns) => {
                out.append(" USING ");
                let mut list = QueryBuilder::new();
                list.append_quoted_array(columns);
                out.append_parenthesis_enclosed(list);
            }
        }
        out.into_query()
    }
}

/// 조인 제약(ON/USING)을 기다리는 상태. `on`/`using`/`end` 중 하나로 FROM에 돌아갑니다.
#[derive(Debug, Clone)]
pub struct JoinBuilder<B> {
    from: FromClause<B>,
    join: Join,
}

impl<B: StatementBase> JoinBuilder<B> {
    pub(crate) fn new(from: FromClause<B>, join: Join) -> Self {
        Self { from, join }
    }

    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.join.alias = Some(alias.into());
        self
    }

    pub fn on(self, predicate: impl Into<Predicate>) -> FromClause<B> {
        self.on_group(ConditionGroup::new().and(predicate))
    }

    pub fn on_group(mut self, group: ConditionGroup) -> FromClause<B> {
        self.join.constraint = JoinConstraint::On(group);
        self.from.push_join(self.join)
    }

    pub fn using<I, S>(mut self, columns: I) -> FromClause<B>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join.constraint = JoinConstraint::Using(columns.into_iter().map(Into::into).collect());
        self.from.push_join(self.join)
    }

    /// 제약 없이 종료 (CROSS/NATURAL)
    pub fn end(self) -> FromClause<B> {
        self.from.push_join(self.join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::select;

    #[test]
    fn test_natural_and_cross() {
        let query = select()
            .from("a")
            .natural_join("b", JoinKind::Left)
            .end()
            .cross_join("c")
            .end()
            .query();
        assert_eq!(query, "SELECT * FROM `a` NATURAL LEFT JOIN `b` CROSS JOIN `c`");
    }

    #[test]
    fn test_using_multiple_columns() {
        let query = select().from("a").inner_join("b").using(["x", "y"]).query();
        assert_eq!(query, "SELECT * FROM `a` INNER JOIN `b` USING (`x`,`y`)");
    }
}
