//! 저장/수정/삭제 오케스트레이션
//!
//! `save`의 기본 모드는 존재 여부를 확인한 뒤 UPDATE 또는 INSERT를 실행합니다.
//!
//! | 모드 | 존재 확인 | UPDATE 0행 |
//! |------|-----------|------------|
//! | `Default` | `SELECT 1 ... LIMIT 1` | INSERT로 진행 |
//! | `Update` | 안 함 | 0을 보고하고 종료 |
//! | `Insert` | 안 함 | - |
//!
//! 저장소 에러(NOT NULL 위반 등)는 변환 없이 그대로 전달됩니다.

use crate::database::{FlowDatabase, NOT_INSERTED};
use crate::error::FlowResult;
use crate::model::{CursorLoader, InternalAdapter, ModelAdapter, RetrievalAdapter as _};
use crate::notify::Action;
use crate::value::SqlValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// `save` 동작 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SaveMode {
    /// 존재 확인 → UPDATE 또는 INSERT
    #[default]
    Default,
    /// 확인 없이 INSERT
    Insert,
    /// 확인 없이 UPDATE
    Update,
}

/// `save` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted { row_id: i64 },
    Updated { rows: usize },
}

impl SaveOutcome {
    pub fn is_insert(&self) -> bool {
        matches!(self, SaveOutcome::Inserted { .. })
    }

    /// 영향받은 행 수
    pub fn affected_rows(&self) -> usize {
        match self {
            SaveOutcome::Inserted { row_id } if *row_id == NOT_INSERTED => 0,
            SaveOutcome::Inserted { .. } => 1,
            SaveOutcome::Updated { rows } => *rows,
        }
    }
}

/// autoincrement 값이 아직 없으면 (NULL 또는 0) 새 모델로 간주합니다.
fn has_identity<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &A::Model,
) -> FlowResult<bool> {
    if adapter.structure().autoincrement_index().is_none() {
        return Ok(true);
    }
    let id = adapter
        .adapter()
        .auto_incrementing_id(model, db.converters())?;
    Ok(!matches!(id, None | Some(0)))
}

/// `SELECT 1 FROM table WHERE <pk> LIMIT 1`
pub fn exists<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &A::Model,
) -> FlowResult<bool> {
    if !has_identity(db, adapter, model)? {
        return Ok(false);
    }
    let values = adapter.adapter().identity_values(model, db.converters())?;
    let cursor = db.wrapper().raw_query(adapter.exists_query(), &values)?;
    Ok(!cursor.is_empty())
}

/// 저장소의 현재 값으로 모델 필드를 덮어씁니다. 행이 없으면 `false`.
pub fn load<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
) -> FlowResult<bool> {
    let values = adapter.adapter().identity_values(model, db.converters())?;
    let mut cursor = db.wrapper().raw_query(adapter.load_query(), &values)?;
    if !cursor.move_to_first() {
        return Ok(false);
    }
    adapter.adapter().load_from_cursor(db, &cursor, model)?;
    adapter.cache_put(db, model)?;
    Ok(true)
}

/// 캐시 → 저장소 순으로 primary key 조회
pub fn load_by_primary_key<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    values: &[SqlValue],
) -> FlowResult<Option<A::Model>> {
    let inner = adapter.adapter();
    inner.primary_condition_for_values(values)?;
    if adapter.is_caching_enabled()
        && let Some(model) = adapter.cached(values)?
    {
        return Ok(Some(model));
    }
    let mut cursor = db.wrapper().raw_query(adapter.load_query(), values)?;
    adapter.load_single(db, &mut cursor)
}

#[instrument(level = "debug", skip_all, fields(table = adapter.table_name(), mode = ?mode))]
pub fn save<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
    mode: SaveMode,
) -> FlowResult<SaveOutcome> {
    match mode {
        SaveMode::Default => {
            if exists(db, adapter, model)? {
                let rows = update_row(db, adapter, model)?;
                if rows > 0 {
                    db.notify_change(adapter.table_name(), Action::Save);
                    return Ok(SaveOutcome::Updated { rows });
                }
                debug!("row vanished after existence check, inserting");
            }
            let row_id = insert_row(db, adapter, model)?;
            if row_id != NOT_INSERTED {
                db.notify_change(adapter.table_name(), Action::Save);
            }
            Ok(SaveOutcome::Inserted { row_id })
        }
        SaveMode::Insert => Ok(SaveOutcome::Inserted {
            row_id: insert(db, adapter, model)?,
        }),
        SaveMode::Update => Ok(SaveOutcome::Updated {
            rows: update(db, adapter, model)?,
        }),
    }
}

pub fn insert<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
) -> FlowResult<i64> {
    let row_id = insert_row(db, adapter, model)?;
    if row_id != NOT_INSERTED {
        db.notify_change(adapter.table_name(), Action::Insert);
    }
    Ok(row_id)
}

pub fn update<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
) -> FlowResult<usize> {
    let rows = update_row(db, adapter, model)?;
    if rows > 0 {
        db.notify_change(adapter.table_name(), Action::Update);
    }
    Ok(rows)
}

/// DELETE 후 캐시 항목 제거. 삭제된 행이 있으면 `true`.
pub fn delete<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &A::Model,
) -> FlowResult<bool> {
    let inner = adapter.adapter();
    let identity = inner.identity_values(model, db.converters())?;
    let mut statement = db.wrapper().compile_statement(adapter.delete_query())?;
    statement.bind_all(identity.iter().cloned());
    let rows = statement.execute_update_delete()?;
    adapter.cache_evict(&identity)?;
    if rows > 0 {
        db.notify_change(adapter.table_name(), Action::Delete);
    }
    debug!(table = adapter.table_name(), rows, "deleted");
    Ok(rows > 0)
}

fn insert_row<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
) -> FlowResult<i64> {
    let mut statement = db.wrapper().compile_statement(adapter.insert_query()?)?;
    adapter
        .adapter()
        .bind_to_insert_statement(&mut statement, model, db.converters())?;
    let row_id = statement.execute_insert()?;
    adapter.after_insert(db, model, row_id)?;
    debug!(table = adapter.table_name(), row_id, "inserted");
    Ok(row_id)
}

fn update_row<A: InternalAdapter>(
    db: &FlowDatabase,
    adapter: &ModelAdapter<A>,
    model: &mut A::Model,
) -> FlowResult<usize> {
    let mut statement = db.wrapper().compile_statement(adapter.update_query())?;
    adapter
        .adapter()
        .bind_to_update_statement(&mut statement, model, db.converters())?;
    let rows = statement.execute_update_delete()?;
    if rows > 0 {
        adapter.cache_put(db, model)?;
    }
    debug!(table = adapter.table_name(), rows, "updated");
    Ok(rows)
}

/// 임의 SQL 결과를 모델 목록으로
pub fn query_list<L: CursorLoader + ?Sized>(
    db: &FlowDatabase,
    loader: &L,
    sql: &str,
    args: &[SqlValue],
) -> FlowResult<Vec<L::Model>> {
    let mut cursor = db.wrapper().raw_query(sql, args)?;
    loader.load_list(db, &mut cursor)
}

/// 임의 SQL 결과의 첫 행
pub fn query_single<L: CursorLoader + ?Sized>(
    db: &FlowDatabase,
    loader: &L,
    sql: &str,
    args: &[SqlValue],
) -> FlowResult<Option<L::Model>> {
    let mut cursor = db.wrapper().raw_query(sql, args)?;
    loader.load_single(db, &mut cursor)
}

/// 외래 키 값으로 참조 모델 로드. NULL이면 `None`.
pub fn load_foreign_key<A: InternalAdapter>(
    db: &FlowDatabase,
    value: &SqlValue,
) -> FlowResult<Option<A::Model>> {
    if value.is_null() {
        return Ok(None);
    }
    db.load_by_primary_key::<A>(std::slice::from_ref(value))
}
