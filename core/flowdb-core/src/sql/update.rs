//! UPDATE base and SET clause

use crate::database::{ContentValues, ConflictAction};
use crate::sql::condition::{Condition, ConditionGroup, Predicate};
use crate::sql::from::FromClause;
use crate::sql::queriable::{Queriable, StatementBase, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder};
use crate::sql::where_clause::Where;

/// `UPDATE [OR action]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Update {
    conflict: ConflictAction,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflict_action(&self) -> ConflictAction {
        self.conflict
    }

    pub fn table(self, table: &str) -> FromClause<Update> {
        FromClause::new(self, table)
    }
}

impl Query for Update {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with("UPDATE");
        if let Some(action) = self.conflict.as_sql() {
            out.append(" OR ").append(action);
        }
        out.into_query()
    }
}

impl StatementBase for Update {
    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }
}

impl FromClause<Update> {
    pub fn or_(mut self, action: ConflictAction) -> Self {
        self.base_mut().conflict = action;
        self
    }

    pub fn or_replace(self) -> Self {
        self.or_(ConflictAction::Replace)
    }

    pub fn or_rollback(self) -> Self {
        self.or_(ConflictAction::Rollback)
    }

    pub fn or_abort(self) -> Self {
        self.or_(ConflictAction::Abort)
    }

    pub fn or_fail(self) -> Self {
        self.or_(ConflictAction::Fail)
    }

    pub fn or_ignore(self) -> Self {
        self.or_(ConflictAction::Ignore)
    }

    /// SET 절 시작
    pub fn set(self, assignment: impl Into<Predicate>) -> Set {
        Set {
            base: self,
            assignments: ConditionGroup::comma_separated(),
        }
        .and(assignment)
    }

    pub fn set_all<I, P>(self, assignments: I) -> Set
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Set {
            base: self,
            assignments: ConditionGroup::comma_separated().and_all(assignments),
        }
    }

    /// ContentValues의 모든 항목을 `col=value`로
    pub fn set_values(self, values: &ContentValues) -> Set {
        self.set_all(values.iter().map(|(column, value)| Condition::column(column).is(value)))
    }
}

/// `UPDATE ... SET a=1,b=2`
#[derive(Debug, Clone)]
pub struct Set {
    base: FromClause<Update>,
    assignments: ConditionGroup,
}

impl Set {
    pub fn and(mut self, assignment: impl Into<Predicate>) -> Self {
        self.assignments = self.assignments.and(assignment);
        self
    }

    pub fn assignments(&self) -> &ConditionGroup {
        &self.assignments
    }

    pub fn where_(self, predicate: impl Into<Predicate>) -> Where<Set> {
        Where::new(self).and(predicate)
    }

    pub fn where_group(self, group: ConditionGroup) -> Where<Set> {
        Where::with_conditions(self, group)
    }
}

impl Query for Set {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with(self.base.query());
        out.append(" SET ").append(self.assignments.query());
        out.into_query()
    }
}

impl Queriable for Set {
    fn statement_kind(&self) -> StatementKind {
        StatementKind::Update
    }

    fn target_table(&self) -> Option<&str> {
        self.base.target_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::update;

    #[test]
    fn test_update_set() {
        let set = update("users").set(Condition::column("name").is("x"));
        assert_eq!(set.query(), "UPDATE `users` SET `name`='x'");
    }

    #[test]
    fn test_update_conflict_and_where() {
        let query = update("users")
            .or_replace()
            .set(Condition::column("age").is(3))
            .and(Condition::column("name").concatenate("!"))
            .where_(Condition::column("id").is(1))
            .query();
        assert_eq!(
            query,
            "UPDATE OR REPLACE `users` SET `age`=3,`name`=`name` || '!' WHERE `id`=1"
        );
    }

    #[test]
    fn test_set_values() {
        let mut values = ContentValues::new();
        values.put("a", 1);
        values.put("b", "two");
        assert_eq!(update("t").set_values(&values).query(), "UPDATE `t` SET `a`=1,`b`='two'");
    }
}
