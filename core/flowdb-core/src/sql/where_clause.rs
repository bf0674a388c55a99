//! WHERE/GROUP BY/HAVING/ORDER BY/LIMIT/OFFSET
//!
//! 절 순서는 고정입니다. 빌더 메서드 호출 순서와 관계없이 항상
//! WHERE → GROUP BY → HAVING → ORDER BY → LIMIT → OFFSET 순으로 렌더링됩니다.

use crate::error::FlowResult;
use crate::sql::clause::{NameAlias, OrderBy};
use crate::sql::condition::{ConditionGroup, Predicate};
use crate::sql::queriable::{Queriable, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder, join};

#[derive(Debug, Clone)]
pub struct Where<B> {
    base: B,
    conditions: ConditionGroup,
    group_by: Vec<NameAlias>,
    having: ConditionGroup,
    order_by: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<B: Queriable> Where<B> {
    pub(crate) fn new(base: B) -> Self {
        Self::with_conditions(base, ConditionGroup::new())
    }

    pub(crate) fn with_conditions(base: B, conditions: ConditionGroup) -> Self {
        Self {
            base,
            conditions,
            group_by: Vec::new(),
            having: ConditionGroup::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn and(mut self, predicate: impl Into<Predicate>) -> Self {
        self.conditions = self.conditions.and(predicate);
        self
    }

    pub fn or(mut self, predicate: impl Into<Predicate>) -> Self {
        self.conditions = self.conditions.or(predicate);
        self
    }

    pub fn and_all<I, P>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        self.conditions = self.conditions.and_all(predicates);
        self
    }

    /// `EXISTS (subquery)`를 AND로 추가
    pub fn exists(self, query: &impl Query) -> Self {
        self.and(crate::sql::condition::ExistenceCondition::exists(query))
    }

    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NameAlias>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, predicate: impl Into<Predicate>) -> Self {
        self.having = self.having.and(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn order_by_all<I: IntoIterator<Item = OrderBy>>(mut self, orders: I) -> Self {
        self.order_by.extend(orders);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn conditions(&self) -> &ConditionGroup {
        &self.conditions
    }

    /// Empty param을 치환한 새 Where
    pub fn replace_empty_params<I, T>(&self, values: I) -> FlowResult<Self>
    where
        B: Clone,
        I: IntoIterator<Item = T>,
        T: Into<crate::sql::condition::Operand>,
    {
        let mut resolved = self.clone();
        resolved.conditions = self.conditions.replace_empty_params(values)?;
        Ok(resolved)
    }

    fn render(&self, limit: Option<i64>) -> String {
        let mut out = QueryBuilder::with(self.base.query());
        out.append_space();
        out.append_qualifier("WHERE", self.conditions.query())
            .append_qualifier("GROUP BY", join(self.group_by.iter().map(Query::query), ","))
            .append_qualifier("HAVING", self.having.query())
            .append_qualifier("ORDER BY", join(self.order_by.iter().map(Query::query), ","));
        match (limit, self.offset) {
            (Some(limit), offset) => {
                out.append_qualifier("LIMIT", limit.to_string());
                if let Some(offset) = offset {
                    out.append_qualifier("OFFSET", offset.to_string());
                }
            }
            // SQLite는 LIMIT 없는 OFFSET을 허용하지 않음
            (None, Some(offset)) => {
                out.append_qualifier("LIMIT", "-1")
                    .append_qualifier("OFFSET", offset.to_string());
            }
            (None, None) => {}
        }
        out.into_query()
    }
}

impl<B: Queriable> Query for Where<B> {
    fn query(&self) -> String {
        self.render(self.limit)
    }
}

impl<B: Queriable> Queriable for Where<B> {
    fn statement_kind(&self) -> StatementKind {
        self.base.statement_kind()
    }

    fn target_table(&self) -> Option<&str> {
        self.base.target_table()
    }

    fn counts_rows(&self) -> bool {
        self.base.counts_rows()
    }

    fn validate(&self) -> FlowResult<()> {
        self.base.validate()
    }

    fn single_query(&self) -> String {
        if self.statement_kind() == StatementKind::Select && self.limit.is_none() {
            self.render(Some(1))
        } else {
            self.query()
        }
    }
}
