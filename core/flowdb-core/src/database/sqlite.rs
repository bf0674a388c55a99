//! SQLite 백엔드 (rusqlite)
//!
//! 단일 연결을 `Mutex`로 보호합니다 (single-writer). 중첩 트랜잭션은 단계별 성공 플래그로
//! 관리하며, 가장 바깥 단계가 끝날 때 한 번만 COMMIT 또는 ROLLBACK합니다.
//!
//! 트랜잭션은 시작한 스레드가 소유합니다. 가장 바깥 `end_transaction`까지 다른 스레드의
//! 호출은 대기하므로, 다른 스레드의 쓰기가 남의 트랜잭션에 섞여 함께 롤백되지 않습니다.

use crate::database::{Cursor, DatabaseStatement, DatabaseWrapper, NOT_INSERTED};
use crate::error::{FlowError, FlowResult};
use crate::value::SqlValue;
use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};
use rusqlite::{Connection, params_from_iter};
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};
use tracing::{debug, info, trace, warn};

/// Prepared statement cache 용량
const STATEMENT_CACHE_CAPACITY: usize = 64;

struct SqliteInner {
    conn: Connection,
    /// 중첩 단계별 성공 여부
    success_flags: Vec<bool>,
    /// 안쪽 단계 중 하나라도 실패했는지
    failed: bool,
}

pub struct SqliteDatabase {
    inner: Mutex<Option<SqliteInner>>,
    /// 열린 트랜잭션을 소유한 스레드
    owner: Mutex<Option<ThreadId>>,
    /// 소유권 해제
    released: Condvar,
    path: Option<PathBuf>,
}

impl SqliteDatabase {
    /// 파일 데이터베이스 열기 (없으면 생성)
    pub fn open(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening sqlite database");
        let conn = Connection::open(path)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// 메모리 데이터베이스
    pub fn open_in_memory() -> FlowResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> FlowResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Ok(Self {
            inner: Mutex::new(Some(SqliteInner {
                conn,
                success_flags: Vec::new(),
                failed: false,
            })),
            owner: Mutex::new(None),
            released: Condvar::new(),
            path,
        })
    }

    /// 파일 경로 (메모리 DB는 `None`)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 다른 스레드의 트랜잭션이 끝날 때까지 기다린 뒤 연결을 잠급니다.
    ///
    /// 소유권 잠금을 쥔 채 연결을 잠그므로, 그 사이에 다른 스레드가 트랜잭션을 시작할 수 없습니다.
    fn acquire(
        &self,
    ) -> FlowResult<(MutexGuard<'_, Option<ThreadId>>, MappedMutexGuard<'_, SqliteInner>)> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.is_some_and(|id| id != me) {
            trace!("waiting for another thread's transaction");
            self.released.wait(&mut owner);
        }
        let inner = MutexGuard::try_map(self.inner.lock(), Option::as_mut)
            .map_err(|_| FlowError::misuse("SqliteDatabase", "database is closed"))?;
        Ok((owner, inner))
    }

    fn lock(&self) -> FlowResult<MappedMutexGuard<'_, SqliteInner>> {
        let (_owner, inner) = self.acquire()?;
        Ok(inner)
    }
}

impl DatabaseWrapper for SqliteDatabase {
    fn exec_sql(&self, sql: &str) -> FlowResult<()> {
        debug!(target: "flowdb_core::sql", %sql, "exec");
        self.lock()?.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin_transaction(&self) -> FlowResult<()> {
        let (mut owner, mut inner) = self.acquire()?;
        if inner.success_flags.is_empty() {
            inner.conn.execute_batch("BEGIN IMMEDIATE")?;
            inner.failed = false;
            *owner = Some(thread::current().id());
        }
        inner.success_flags.push(false);
        Ok(())
    }

    fn set_transaction_successful(&self) {
        if let Ok(mut inner) = self.lock()
            && let Some(flag) = inner.success_flags.last_mut()
        {
            *flag = true;
        }
    }

    fn end_transaction(&self) -> FlowResult<()> {
        let (mut owner, mut inner) = self.acquire()?;
        let success = inner
            .success_flags
            .pop()
            .ok_or_else(|| FlowError::misuse("SqliteDatabase", "end_transaction without begin_transaction"))?;
        if !success {
            inner.failed = true;
        }
        if !inner.success_flags.is_empty() {
            return Ok(());
        }
        let result = finish_outermost(&mut inner);
        *owner = None;
        self.released.notify_all();
        result
    }

    /// 현재 스레드가 트랜잭션 안에 있는지
    fn in_transaction(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    fn compile_statement(&self, sql: &str) -> FlowResult<DatabaseStatement<'_>> {
        self.lock()?.conn.prepare_cached(sql)?;
        Ok(DatabaseStatement::new(self, sql))
    }

    fn raw_query(&self, sql: &str, args: &[SqlValue]) -> FlowResult<Cursor> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for i in 0..width {
                record.push(row.get::<_, SqlValue>(i)?);
            }
            values.push(record);
        }
        Ok(Cursor::new(columns, values))
    }

    fn execute_update_delete(&self, sql: &str, args: &[SqlValue]) -> FlowResult<usize> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(args.iter()))?)
    }

    fn execute_insert(&self, sql: &str, args: &[SqlValue]) -> FlowResult<i64> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare_cached(sql)?;
        let changed = stmt.execute(params_from_iter(args.iter()))?;
        if changed == 0 {
            return Ok(NOT_INSERTED);
        }
        Ok(inner.conn.last_insert_rowid())
    }

    fn version(&self) -> FlowResult<i32> {
        let inner = self.lock()?;
        Ok(inner
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get::<_, i32>(0))?)
    }

    fn set_version(&self, version: i32) -> FlowResult<()> {
        self.lock()?
            .conn
            .execute_batch(&format!("PRAGMA user_version = {version}"))?;
        Ok(())
    }

    fn close(&self) -> FlowResult<()> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.is_some_and(|id| id != me) {
            self.released.wait(&mut owner);
        }
        let Some(inner) = self.inner.lock().take() else {
            return Ok(());
        };
        *owner = None;
        drop(owner);
        self.released.notify_all();
        if !inner.success_flags.is_empty() {
            warn!("closing database with an open transaction");
        }
        inner.conn.close().map_err(|(_, err)| err.into())
    }
}

/// 가장 바깥 단계 종료: 실패한 단계가 있으면 ROLLBACK, 아니면 COMMIT
fn finish_outermost(inner: &mut SqliteInner) -> FlowResult<()> {
    if inner.failed {
        inner.failed = false;
        debug!("rolling back transaction");
        inner.conn.execute_batch("ROLLBACK")?;
        return Ok(());
    }
    if let Err(err) = inner.conn.execute_batch("COMMIT") {
        warn!(error = %err, "commit failed, rolling back");
        if !inner.conn.is_autocommit() {
            let _ = inner.conn.execute_batch("ROLLBACK");
        }
        return Err(err.into());
    }
    Ok(())
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ConflictAction, ContentValues, execute_transaction};

    fn db() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.exec_sql("CREATE TABLE t(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
            .unwrap();
        db
    }

    fn count(db: &SqliteDatabase) -> i64 {
        db.query_long("SELECT COUNT(*) FROM t", &[]).unwrap()
    }

    #[test]
    fn test_insert_query_update_delete() {
        let db = db();
        let id = db
            .execute_insert("INSERT INTO t(name) VALUES (?)", &[SqlValue::from("a")])
            .unwrap();
        assert_eq!(id, 1);

        let mut cursor = db.raw_query("SELECT * FROM t", &[]).unwrap();
        assert_eq!(cursor.column_names(), &["id".to_string(), "name".to_string()]);
        assert!(cursor.move_to_first());
        assert_eq!(cursor.get_as::<String>("name").unwrap(), "a");

        let n = db
            .execute_update_delete("UPDATE t SET name = ? WHERE id = ?", &["b".into(), 1.into()])
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(db.delete("t", "`id`=1", &[]).unwrap(), 1);
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn test_ignored_insert_reports_not_inserted() {
        let db = db();
        db.execute_insert("INSERT INTO t(id, name) VALUES (7, 'a')", &[]).unwrap();
        let row_id = db
            .execute_insert("INSERT OR IGNORE INTO t(id, name) VALUES (7, 'b')", &[])
            .unwrap();
        assert_eq!(row_id, NOT_INSERTED);
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn test_content_value_helpers() {
        let db = db();
        let mut values = ContentValues::new();
        values.put("name", "x");
        let id = db.insert_with_on_conflict("t", &values, ConflictAction::None).unwrap();

        values.put("name", "y");
        let n = db
            .update_with_on_conflict("t", &values, "`id`=?", &[id.into()], ConflictAction::Replace)
            .unwrap();
        assert_eq!(n, 1);
        let name = db.raw_query("SELECT name FROM t", &[]).unwrap();
        assert_eq!(name.rows()[0][0], SqlValue::from("y"));
    }

    #[test]
    fn test_nested_transaction_rollback_when_inner_fails() {
        let db = db();
        db.begin_transaction().unwrap();
        db.execute_insert("INSERT INTO t(name) VALUES ('a')", &[]).unwrap();
        {
            db.begin_transaction().unwrap();
            // 성공 표시 없이 종료
            db.end_transaction().unwrap();
        }
        db.set_transaction_successful();
        db.end_transaction().unwrap();
        assert_eq!(count(&db), 0);
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_execute_transaction_commit_and_rollback() {
        let db = db();
        execute_transaction(&db, |db| {
            db.execute_insert("INSERT INTO t(name) VALUES ('a')", &[])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&db), 1);

        let result: FlowResult<()> = execute_transaction(&db, |db| {
            db.execute_insert("INSERT INTO t(name) VALUES ('b')", &[])?;
            db.execute_insert("INSERT INTO t(name) VALUES (NULL)", &[])?;
            Ok(())
        });
        let err = result.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn test_other_thread_waits_for_transaction_owner() {
        let db = db();
        db.begin_transaction().unwrap();
        db.execute_insert("INSERT INTO t(name) VALUES ('owner')", &[]).unwrap();
        assert!(db.in_transaction());

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                assert!(!db.in_transaction());
                db.execute_insert("INSERT INTO t(name) VALUES ('other')", &[])
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            // 다른 스레드의 쓰기는 아직 대기 중
            assert!(!writer.is_finished());
            db.end_transaction().unwrap();
            writer.join().unwrap().unwrap();
        });

        // owner 트랜잭션만 롤백되고 다른 스레드의 쓰기는 남음
        let names = db.raw_query("SELECT name FROM t", &[]).unwrap();
        assert_eq!(names.rows().len(), 1);
        assert_eq!(names.rows()[0][0], SqlValue::from("other"));
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_end_without_begin_is_error() {
        let db = db();
        assert!(db.end_transaction().is_err());
    }

    #[test]
    fn test_real_literals_keep_storage_class() {
        let db = db();
        let literal = |v: f64| SqlValue::Real(v).to_sql_literal();
        let sql = format!(
            "SELECT typeof({}), typeof({}), {} > 1e308, {} IS NULL",
            literal(1e20),
            literal(f64::INFINITY),
            literal(f64::INFINITY),
            literal(f64::NAN)
        );
        let cursor = db.raw_query(&sql, &[]).unwrap();
        assert_eq!(
            cursor.rows()[0],
            vec![
                SqlValue::from("real"),
                SqlValue::from("real"),
                SqlValue::Integer(1),
                SqlValue::Integer(1),
            ]
        );
    }

    #[test]
    fn test_version_round_trip() {
        let db = db();
        assert_eq!(db.version().unwrap(), 0);
        db.set_version(3).unwrap();
        assert_eq!(db.version().unwrap(), 3);
    }

    #[test]
    fn test_compiled_statement_binding() {
        let db = db();
        let mut stmt = db.compile_statement("INSERT INTO t(name) VALUES (?)").unwrap();
        stmt.bind(1, "first");
        assert_eq!(stmt.execute_insert().unwrap(), 1);
        stmt.clear_bindings();
        stmt.bind(1, "second");
        assert_eq!(stmt.execute_insert().unwrap(), 2);

        let count_stmt = db.compile_statement("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(count_stmt.simple_query_for_long().unwrap(), 2);
    }

    #[test]
    fn test_closed_database_rejects_calls() {
        let db = db();
        db.close().unwrap();
        assert!(db.exec_sql("SELECT 1").is_err());
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.db");
        {
            let db = SqliteDatabase::open(&path).unwrap();
            db.exec_sql("CREATE TABLE k(v TEXT)").unwrap();
            db.execute_insert("INSERT INTO k VALUES ('x')", &[]).unwrap();
            db.close().unwrap();
        }
        let db = SqliteDatabase::open(&path).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(db.query_long("SELECT COUNT(*) FROM k", &[]).unwrap(), 1);
    }
}
