//! FROM: base statement와 테이블의 연결점

use crate::sql::clause::{NameAlias, OrderBy};
use crate::sql::condition::{ConditionGroup, Predicate};
use crate::sql::index::IndexedBy;
use crate::sql::join::{Join, JoinBuilder, JoinKind};
use crate::sql::queriable::{Queriable, StatementBase, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use crate::sql::where_clause::Where;

/// `<base> FROM <table> [AS alias] [<join>...]`
///
/// UPDATE base일 때는 `FROM` 키워드를 생략합니다.
#[derive(Debug, Clone)]
pub struct FromClause<B> {
    base: B,
    table: String,
    alias: Option<String>,
    joins: Vec<Join>,
}

impl<B: StatementBase> FromClause<B> {
    pub(crate) fn new(base: B, table: &str) -> Self {
        Self {
            base,
            table: table.to_string(),
            alias: None,
            joins: Vec::new(),
        }
    }

    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub(crate) fn push_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn join(self, table: &str, kind: JoinKind) -> JoinBuilder<B> {
        JoinBuilder::new(self, Join::new(kind, table))
    }

    pub fn inner_join(self, table: &str) -> JoinBuilder<B> {
        self.join(table, JoinKind::Inner)
    }

    pub fn left_outer_join(self, table: &str) -> JoinBuilder<B> {
        self.join(table, JoinKind::LeftOuter)
    }

    pub fn left_join(self, table: &str) -> JoinBuilder<B> {
        self.join(table, JoinKind::Left)
    }

    pub fn cross_join(self, table: &str) -> JoinBuilder<B> {
        self.join(table, JoinKind::Cross)
    }

    /// `NATURAL <kind> JOIN`
    pub fn natural_join(self, table: &str, kind: JoinKind) -> JoinBuilder<B> {
        JoinBuilder::new(self, Join::new(kind, table).natural())
    }

    pub fn where_(self, predicate: impl Into<Predicate>) -> Where<Self> {
        Where::new(self).and(predicate)
    }

    pub fn where_group(self, group: ConditionGroup) -> Where<Self> {
        Where::with_conditions(self, group)
    }

    /// 조건 없는 Where (ORDER BY/LIMIT만 붙일 때)
    pub fn where_all(self) -> Where<Self> {
        Where::new(self)
    }

    pub fn indexed_by(self, index: &str) -> IndexedBy<B> {
        IndexedBy::new(self, index)
    }

    pub fn group_by<I, C>(self, columns: I) -> Where<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<NameAlias>,
    {
        Where::new(self).group_by(columns)
    }

    pub fn order_by(self, order: OrderBy) -> Where<Self> {
        Where::new(self).order_by(order)
    }

    pub fn limit(self, limit: i64) -> Where<Self> {
        Where::new(self).limit(limit)
    }

    pub fn offset(self, offset: i64) -> Where<Self> {
        Where::new(self).offset(offset)
    }
}

impl<B: StatementBase> Query for FromClause<B> {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with(self.base.query());
        out.append_space();
        if self.base.kind() != StatementKind::Update {
            out.append("FROM ");
        }
        out.append_quoted(&self.table);
        if let Some(alias) = &self.alias {
            out.append(" AS ").append(quote_identifier(alias));
        }
        for join in &self.joins {
            out.append_space().append(join.query());
        }
        out.into_query()
    }
}

impl<B: StatementBase> Queriable for FromClause<B> {
    fn statement_kind(&self) -> StatementKind {
        self.base.kind()
    }

    fn target_table(&self) -> Option<&str> {
        Some(&self.table)
    }

    fn counts_rows(&self) -> bool {
        self.base.counts_rows()
    }
}
