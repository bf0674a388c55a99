//! Schema migrations
//!
//! 버전별로 등록된 [`Migration`]을 `(old, new]` 범위에서 순서대로 실행합니다.
//! 한 번의 `migrate` 호출은 하나의 저장소 트랜잭션으로 묶이며, 성공하면
//! 저장된 버전(`PRAGMA user_version`)을 새 버전으로 갱신합니다.

use crate::database::{DatabaseWrapper, FlowDatabase, execute_transaction};
use crate::error::FlowResult;
use crate::sql::condition::{Condition, ConditionGroup, Predicate};
use crate::sql::index::Index;
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use crate::sql::update;
use crate::value::SqlType;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// 스키마 버전 하나에 속한 마이그레이션 단계
pub trait Migration: Send + Sync {
    fn on_pre_migrate(&self) {}

    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()>;

    fn on_post_migrate(&self) {}
}

impl<F> Migration for F
where
    F: Fn(&dyn DatabaseWrapper) -> FlowResult<()> + Send + Sync,
{
    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()> {
        self(db)
    }
}

/// `ALTER TABLE`: 이름 변경과 컬럼 추가
#[derive(Debug, Clone, Default)]
pub struct AlterTableMigration {
    table: String,
    rename_from: Option<String>,
    columns: Vec<(String, SqlType)>,
}

impl AlterTableMigration {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// 기존 테이블 `old_name`을 이 테이블 이름으로 변경
    pub fn rename_from(mut self, old_name: impl Into<String>) -> Self {
        self.rename_from = Some(old_name.into());
        self
    }

    pub fn add_column(mut self, sql_type: SqlType, name: impl Into<String>) -> Self {
        self.columns.push((name.into(), sql_type));
        self
    }

    /// 실행될 문장 목록 (rename이 먼저)
    pub fn queries(&self) -> Vec<String> {
        let mut queries = Vec::with_capacity(self.columns.len() + 1);
        if let Some(old) = &self.rename_from {
            queries.push(format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_identifier(old),
                quote_identifier(&self.table)
            ));
        }
        for (name, sql_type) in &self.columns {
            let mut out = QueryBuilder::with("ALTER TABLE ");
            out.append_quoted(&self.table)
                .append(" ADD COLUMN ")
                .append_quoted(name)
                .append_space()
                .append_sql_type(*sql_type);
            queries.push(out.into_query());
        }
        queries
    }
}

impl Migration for AlterTableMigration {
    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()> {
        for sql in self.queries() {
            debug!(target: "flowdb_core::sql", %sql, "alter table");
            db.exec_sql(&sql)?;
        }
        Ok(())
    }
}

/// 인덱스 생성
#[derive(Debug, Clone)]
pub struct IndexMigration {
    index: Index,
}

impl IndexMigration {
    pub fn new(index: Index) -> Self {
        Self { index }
    }
}

impl Migration for IndexMigration {
    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()> {
        db.exec_sql(&self.index.query())
    }
}

/// 기존 행을 일괄 갱신 (`UPDATE table SET ... WHERE ...`)
#[derive(Debug, Clone)]
pub struct UpdateTableMigration {
    table: String,
    assignments: Vec<Condition>,
    conditions: ConditionGroup,
}

impl UpdateTableMigration {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions: ConditionGroup::new(),
        }
    }

    pub fn set(mut self, assignment: Condition) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn where_(mut self, predicate: impl Into<Predicate>) -> Self {
        self.conditions = self.conditions.and(predicate);
        self
    }

    pub fn query(&self) -> String {
        let set = update(&self.table).set_all(self.assignments.iter().cloned());
        if self.conditions.is_empty() {
            set.query()
        } else {
            set.where_group(self.conditions.clone()).query()
        }
    }
}

impl Migration for UpdateTableMigration {
    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()> {
        db.execute_update_delete(&self.query(), &[])?;
        Ok(())
    }
}

/// SQL 스크립트 파일 마이그레이션
///
/// `--`로 시작하는 줄은 주석, 문장은 `;`로 끝날 때까지 여러 줄을 이어 붙입니다.
#[derive(Debug, Clone, Default)]
pub struct ScriptMigration {
    statements: Vec<String>,
}

impl ScriptMigration {
    pub fn from_script(script: &str) -> Self {
        Self {
            statements: parse_script(script),
        }
    }

    pub fn from_file(path: &Path) -> FlowResult<Self> {
        let script = fs::read_to_string(path)?;
        Ok(Self::from_script(&script))
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl Migration for ScriptMigration {
    fn migrate(&self, db: &dyn DatabaseWrapper) -> FlowResult<()> {
        for sql in &self.statements {
            debug!(target: "flowdb_core::sql", %sql, "script statement");
            db.exec_sql(sql)?;
        }
        Ok(())
    }
}

/// 스크립트 텍스트를 문장 단위로 분리
pub fn parse_script(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        if let Some(body) = line.strip_suffix(';') {
            current.push_str(body.trim_end());
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        } else {
            current.push_str(line);
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}

/// 버전별 마이그레이션 등록부
#[derive(Default)]
pub struct MigrationRunner {
    migrations: Mutex<BTreeMap<i32, Vec<Box<dyn Migration>>>>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `version`으로 올라갈 때 실행할 마이그레이션 추가 (등록 순서대로 실행)
    pub fn add(&self, version: i32, migration: impl Migration + 'static) {
        self.migrations
            .lock()
            .entry(version)
            .or_default()
            .push(Box::new(migration));
    }

    pub fn versions(&self) -> Vec<i32> {
        self.migrations.lock().keys().copied().collect()
    }

    /// `(old_version, new_version]` 범위의 마이그레이션을 한 트랜잭션에서 실행
    pub fn migrate(&self, db: &FlowDatabase, old_version: i32, new_version: i32) -> FlowResult<()> {
        if new_version <= old_version {
            return Ok(());
        }
        let migrations = self.migrations.lock();
        execute_transaction(db.wrapper(), |wrapper| {
            for (version, steps) in migrations.range(old_version + 1..=new_version) {
                info!(version, steps = steps.len(), "running migrations");
                for step in steps {
                    step.on_pre_migrate();
                    step.migrate(wrapper)?;
                    step.on_post_migrate();
                }
            }
            wrapper.set_version(new_version)
        })
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("versions", &self.versions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = "\
-- create things
CREATE TABLE a(x INTEGER);
INSERT INTO a
  VALUES (1);

-- trailing statement without semicolon
UPDATE a SET x = 2";
        assert_eq!(
            parse_script(script),
            vec![
                "CREATE TABLE a(x INTEGER)".to_string(),
                "INSERT INTO a VALUES (1)".to_string(),
                "UPDATE a SET x = 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_alter_table_queries() {
        let migration = AlterTableMigration::new("people")
            .rename_from("persons")
            .add_column(SqlType::Text, "email")
            .add_column(SqlType::Integer, "age");
        assert_eq!(
            migration.queries(),
            vec![
                "ALTER TABLE `persons` RENAME TO `people`",
                "ALTER TABLE `people` ADD COLUMN `email` TEXT",
                "ALTER TABLE `people` ADD COLUMN `age` INTEGER",
            ]
        );
    }

    #[test]
    fn test_update_table_query() {
        let migration = UpdateTableMigration::new("users")
            .set(Condition::column("active").is(1))
            .where_(Condition::column("active").is_null());
        assert_eq!(
            migration.query(),
            "UPDATE `users` SET `active`=1 WHERE `active` IS NULL"
        );
    }

    #[test]
    fn test_runner_versions_sorted() {
        let runner = MigrationRunner::new();
        runner.add(3, ScriptMigration::default());
        runner.add(2, ScriptMigration::default());
        assert_eq!(runner.versions(), vec![2, 3]);
    }
}
