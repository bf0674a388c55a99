//! CREATE TRIGGER
//!
//! `Trigger::create(name).after().on_insert(table).begin(&stmt)` 순서로 만듭니다.

use crate::database::FlowDatabase;
use crate::error::FlowResult;
use crate::sql::condition::{ConditionGroup, Predicate};
use crate::sql::queriable::{Queriable, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl TriggerTiming {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Delete,
    /// `UPDATE [OF columns]`
    Update(Vec<String>),
}

/// 트리거 이름과 타이밍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    name: String,
    temporary: bool,
    timing: Option<TriggerTiming>,
}

impl Trigger {
    pub fn create(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temporary: false,
            timing: None,
        }
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn before(mut self) -> Self {
        self.timing = Some(TriggerTiming::Before);
        self
    }

    pub fn after(mut self) -> Self {
        self.timing = Some(TriggerTiming::After);
        self
    }

    pub fn instead_of(mut self) -> Self {
        self.timing = Some(TriggerTiming::InsteadOf);
        self
    }

    pub fn on_insert(self, table: &str) -> TriggerMethod {
        TriggerMethod::new(self, TriggerEvent::Insert, table)
    }

    pub fn on_delete(self, table: &str) -> TriggerMethod {
        TriggerMethod::new(self, TriggerEvent::Delete, table)
    }

    pub fn on_update<I, S>(self, table: &str, columns: I) -> TriggerMethod
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        TriggerMethod::new(self, TriggerEvent::Update(columns), table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 이벤트와 대상 테이블이 정해진 트리거
#[derive(Debug, Clone)]
pub struct TriggerMethod {
    trigger: Trigger,
    event: TriggerEvent,
    table: String,
    for_each_row: bool,
    when: Option<ConditionGroup>,
}

impl TriggerMethod {
    fn new(trigger: Trigger, event: TriggerEvent, table: &str) -> Self {
        Self {
            trigger,
            event,
            table: table.to_string(),
            for_each_row: false,
            when: None,
        }
    }

    pub fn for_each_row(mut self) -> Self {
        self.for_each_row = true;
        self
    }

    pub fn when(mut self, predicate: impl Into<Predicate>) -> Self {
        let group = self.when.take().unwrap_or_default();
        self.when = Some(group.and(predicate));
        self
    }

    /// 트리거 본문의 첫 문장
    pub fn begin(self, statement: &impl Query) -> CompletedTrigger {
        CompletedTrigger {
            method: self,
            statements: vec![statement.query()],
        }
    }

    fn render_header(&self, out: &mut QueryBuilder) {
        out.append("CREATE ");
        if self.trigger.temporary {
            out.append("TEMP ");
        }
        out.append("TRIGGER IF NOT EXISTS ")
            .append_quoted(&self.trigger.name)
            .append_space();
        if let Some(timing) = self.trigger.timing {
            out.append(timing.as_sql()).append_space();
        }
        match &self.event {
            TriggerEvent::Insert => {
                out.append("INSERT");
            }
            TriggerEvent::Delete => {
                out.append("DELETE");
            }
            TriggerEvent::Update(columns) => {
                out.append("UPDATE");
                if !columns.is_empty() {
                    out.append(" OF ").append_quoted_array(columns);
                }
            }
        }
        out.append(" ON ").append_quoted(&self.table);
        if self.for_each_row {
            out.append(" FOR EACH ROW");
        }
        if let Some(when) = &self.when
            && !when.is_empty()
        {
            out.append(" WHEN ").append(when.query());
        }
    }
}

/// 본문까지 완성된 트리거
#[derive(Debug, Clone)]
pub struct CompletedTrigger {
    method: TriggerMethod,
    statements: Vec<String>,
}

impl CompletedTrigger {
    /// 본문에 문장 추가
    pub fn and(mut self, statement: &impl Query) -> Self {
        self.statements.push(statement.query());
        self
    }

    pub fn name(&self) -> &str {
        &self.method.trigger.name
    }

    pub fn table(&self) -> &str {
        &self.method.table
    }

    /// 트리거 생성
    pub fn enable(&self, db: &FlowDatabase) -> FlowResult<()> {
        debug!(trigger = %self.name(), table = %self.table(), "create trigger");
        db.wrapper().exec_sql(&self.query())
    }

    /// 트리거 삭제
    pub fn disable(&self, db: &FlowDatabase) -> FlowResult<()> {
        db.wrapper()
            .exec_sql(&format!("DROP TRIGGER IF EXISTS {}", quote_identifier(self.name())))
    }
}

impl Query for CompletedTrigger {
    fn query(&self) -> String {
        let mut out = QueryBuilder::new();
        self.method.render_header(&mut out);
        out.append(" BEGIN ");
        for statement in &self.statements {
            out.append(statement).append("; ");
        }
        out.append("END");
        out.into_query()
    }
}

impl Queriable for CompletedTrigger {
    fn statement_kind(&self) -> StatementKind {
        StatementKind::Schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::condition::{Condition, Operand};
    use crate::sql::{insert_into, update};

    #[test]
    fn test_after_insert_trigger() {
        let body = update("stats").set(Condition::column("total").is(Operand::raw("`total` + 1")));
        let trigger = Trigger::create("count_users").after().on_insert("users").begin(&body);
        assert_eq!(
            trigger.query(),
            "CREATE TRIGGER IF NOT EXISTS `count_users` AFTER INSERT ON `users` \
             BEGIN UPDATE `stats` SET `total`=`total` + 1; END"
        );
    }

    #[test]
    fn test_update_of_columns_with_when_and_two_statements() {
        let first = insert_into("log").values(["changed"]).unwrap();
        let second = update("users").set(Condition::column("dirty").is(1));
        let trigger = Trigger::create("t1")
            .temporary()
            .before()
            .on_update("users", ["name"])
            .for_each_row()
            .when(Condition::raw_column("NEW.`name`").is_not(Operand::raw("OLD.`name`")))
            .begin(&first)
            .and(&second);
        assert_eq!(
            trigger.query(),
            "CREATE TEMP TRIGGER IF NOT EXISTS `t1` BEFORE UPDATE OF `name` ON `users` \
             FOR EACH ROW WHEN NEW.`name`!=OLD.`name` \
             BEGIN INSERT INTO `log` VALUES ('changed'); UPDATE `users` SET `dirty`=1; END"
        );
    }

    #[test]
    fn test_trigger_name_is_quoted() {
        let body = update("stats").set(Condition::column("total").is(0));
        let trigger = Trigger::create("order log").after().on_delete("order").begin(&body);
        assert!(
            trigger
                .query()
                .starts_with("CREATE TRIGGER IF NOT EXISTS `order log` AFTER DELETE ON `order` BEGIN")
        );
    }
}
