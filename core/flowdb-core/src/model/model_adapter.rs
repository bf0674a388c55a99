//! 런타임 어댑터
//!
//! [`ModelAdapter`]는 [`InternalAdapter`] 하나를 감싸 INSERT/UPDATE/DELETE/EXISTS 쿼리와
//! 선택적인 [`ModelCache`]를 소유합니다. INSERT 쿼리와 캐시는 처음 사용할 때 만듭니다.
//! [`QueryModelAdapter`]는 뷰와 query model을 위한 읽기 전용 어댑터입니다.

use crate::database::{Cursor, FlowDatabase, NOT_INSERTED};
use crate::error::{FlowError, FlowResult};
use crate::model::adapter::{CursorLoader, InternalAdapter, RetrievalAdapter};
use crate::model::cache::{CacheStats, LruModelCache, ModelCache};
use crate::model::structure::{Column, TableKind, TableStructure};
use crate::notify::Action;
use crate::sql::clause::NameAlias;
use crate::sql::condition::{Condition, ConditionGroup, Operand};
use crate::sql::query_builder::Query;
use crate::sql::{Insert, delete_from, select, select_columns, update};
use crate::sql_utils::{self, SaveMode, SaveOutcome};
use crate::value::SqlValue;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// `` `pk1`=? AND `pk2`=? ``
pub(crate) fn identity_params(structure: &TableStructure) -> ConditionGroup {
    ConditionGroup::of(
        structure
            .primary_key_columns()
            .map(|column| Condition::column(column.name()).is(Operand::Param)),
    )
}

fn exists_query(structure: &TableStructure) -> String {
    select_columns([NameAlias::raw("1")])
        .from(structure.name())
        .where_group(identity_params(structure))
        .limit(1)
        .query()
}

fn load_query(structure: &TableStructure) -> String {
    select()
        .from(structure.name())
        .where_group(identity_params(structure))
        .limit(1)
        .query()
}

fn build_insert_query(structure: &TableStructure) -> FlowResult<String> {
    let columns: Vec<&str> = structure
        .columns()
        .iter()
        .filter(|c| !c.is_autoincrement())
        .map(Column::name)
        .collect();
    let insert = Insert::new(structure.name()).or_(structure.insert_conflict());
    if columns.is_empty() {
        return Ok(format!("{} DEFAULT VALUES", insert.query()));
    }
    Ok(insert
        .columns(columns.iter().copied())?
        .values(columns.iter().map(|_| Operand::Param))?
        .query())
}

/// 테이블 모델 어댑터
pub struct ModelAdapter<A: InternalAdapter> {
    adapter: Arc<A>,
    cache_size: usize,
    cache: OnceLock<Box<dyn ModelCache<A::Model>>>,
    insert_query: OnceLock<String>,
    update_query: String,
    delete_query: String,
    exists_query: String,
    load_query: String,
}

impl<A: InternalAdapter> ModelAdapter<A> {
    /// 뷰나 query model 구조는 거부합니다 ([`FlowError::ReadOnlyModel`]).
    pub fn new(adapter: Arc<A>, cache_size: usize) -> FlowResult<Self> {
        let structure = adapter.structure();
        if !structure.is_table() {
            return Err(FlowError::ReadOnlyModel {
                model: structure.name().to_string(),
            });
        }
        let name = structure.name();
        let update_query = update(name)
            .or_(structure.update_conflict())
            .set_all(
                structure
                    .columns()
                    .iter()
                    .map(|c| Condition::column(c.name()).is(Operand::Param)),
            )
            .where_group(identity_params(structure))
            .query();
        let delete_query = delete_from(name)
            .where_group(identity_params(structure))
            .query();

        Ok(Self {
            cache_size,
            cache: OnceLock::new(),
            insert_query: OnceLock::new(),
            update_query,
            delete_query,
            exists_query: exists_query(structure),
            load_query: load_query(structure),
            adapter,
        })
    }

    /// 기본 LRU 대신 사용할 캐시
    pub fn with_cache(self, cache: Box<dyn ModelCache<A::Model>>) -> Self {
        let _ = self.cache.set(cache);
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn structure(&self) -> &TableStructure {
        self.adapter.structure()
    }

    pub fn table_name(&self) -> &str {
        self.adapter.table_name()
    }

    pub fn insert_query(&self) -> FlowResult<&str> {
        if let Some(query) = self.insert_query.get() {
            return Ok(query);
        }
        let query = build_insert_query(self.structure())?;
        debug!(table = self.table_name(), %query, "compiled insert statement");
        Ok(self.insert_query.get_or_init(|| query))
    }

    pub fn update_query(&self) -> &str {
        &self.update_query
    }

    pub fn delete_query(&self) -> &str {
        &self.delete_query
    }

    pub fn exists_query(&self) -> &str {
        &self.exists_query
    }

    pub fn load_query(&self) -> &str {
        &self.load_query
    }

    pub fn save(&self, db: &FlowDatabase, model: &mut A::Model) -> FlowResult<SaveOutcome> {
        sql_utils::save(db, self, model, SaveMode::Default)
    }

    pub fn save_with_mode(
        &self,
        db: &FlowDatabase,
        model: &mut A::Model,
        mode: SaveMode,
    ) -> FlowResult<SaveOutcome> {
        sql_utils::save(db, self, model, mode)
    }

    /// INSERT 후 row id
    pub fn insert(&self, db: &FlowDatabase, model: &mut A::Model) -> FlowResult<i64> {
        sql_utils::insert(db, self, model)
    }

    /// 영향받은 행 수 (0이면 INSERT하지 않음)
    pub fn update(&self, db: &FlowDatabase, model: &mut A::Model) -> FlowResult<usize> {
        sql_utils::update(db, self, model)
    }

    pub fn delete(&self, db: &FlowDatabase, model: &A::Model) -> FlowResult<bool> {
        sql_utils::delete(db, self, model)
    }

    pub fn exists(&self, db: &FlowDatabase, model: &A::Model) -> FlowResult<bool> {
        sql_utils::exists(db, self, model)
    }

    /// 저장소에서 모델 필드를 다시 읽습니다 (캐시 무시).
    pub fn load(&self, db: &FlowDatabase, model: &mut A::Model) -> FlowResult<bool> {
        sql_utils::load(db, self, model)
    }

    /// 캐시를 먼저 확인하고, 없으면 primary key로 조회
    pub fn load_by_primary_key(
        &self,
        db: &FlowDatabase,
        values: &[SqlValue],
    ) -> FlowResult<Option<A::Model>> {
        sql_utils::load_by_primary_key(db, self, values)
    }

    /// 한 저장소 트랜잭션에서 모두 저장. 알림은 테이블당 한 번으로 합쳐집니다.
    pub fn save_all(&self, db: &FlowDatabase, models: &mut [A::Model]) -> FlowResult<usize> {
        db.execute_transaction(|db| {
            for model in models.iter_mut() {
                self.save(db, model)?;
            }
            Ok(models.len())
        })
    }

    /// 컴파일된 INSERT 하나로 모두 삽입. 실제로 삽입된 행 수
    pub fn insert_all(&self, db: &FlowDatabase, models: &mut [A::Model]) -> FlowResult<usize> {
        db.execute_transaction(|db| {
            let mut statement = db.wrapper().compile_statement(self.insert_query()?)?;
            let mut inserted = 0;
            for model in models.iter_mut() {
                self.adapter
                    .bind_to_insert_statement(&mut statement, model, db.converters())?;
                let row_id = statement.execute_insert()?;
                self.after_insert(db, model, row_id)?;
                if row_id != NOT_INSERTED {
                    inserted += 1;
                }
            }
            if inserted > 0 {
                db.notify_change(self.table_name(), Action::Insert);
            }
            Ok(inserted)
        })
    }

    /// 영향받은 전체 행 수
    pub fn update_all(&self, db: &FlowDatabase, models: &mut [A::Model]) -> FlowResult<usize> {
        db.execute_transaction(|db| {
            let mut total = 0;
            for model in models.iter_mut() {
                total += self.update(db, model)?;
            }
            Ok(total)
        })
    }

    /// 삭제된 모델 수
    pub fn delete_all(&self, db: &FlowDatabase, models: &[A::Model]) -> FlowResult<usize> {
        db.execute_transaction(|db| {
            let mut deleted = 0;
            for model in models {
                if self.delete(db, model)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    /// autoincrement id 반영 후 캐시 갱신
    pub(crate) fn after_insert(
        &self,
        db: &FlowDatabase,
        model: &mut A::Model,
        row_id: i64,
    ) -> FlowResult<()> {
        if row_id == NOT_INSERTED {
            debug!(table = self.table_name(), "insert ignored");
            return Ok(());
        }
        if self.structure().autoincrement_index().is_some() {
            self.adapter.update_auto_increment(model, row_id);
        }
        self.cache_put(db, model)
    }

    pub fn is_caching_enabled(&self) -> bool {
        self.adapter.caching_enabled()
    }

    /// 캐시 (처음 호출 시 테이블 캐시 크기로 생성)
    pub fn cache(&self) -> FlowResult<&dyn ModelCache<A::Model>> {
        if !self.is_caching_enabled() {
            return Err(FlowError::CachingNotEnabled {
                table: self.table_name().to_string(),
            });
        }
        let cache = self.cache.get_or_init(|| {
            debug!(table = self.table_name(), capacity = self.cache_size, "creating model cache");
            let cache: Box<dyn ModelCache<A::Model>> = Box::new(LruModelCache::new(self.cache_size));
            cache
        });
        Ok(cache.as_ref())
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// primary key 값으로 캐시 조회
    pub fn cached(&self, values: &[SqlValue]) -> FlowResult<Option<A::Model>> {
        let key = self.adapter.caching_id(values)?;
        Ok(self.cache()?.get(&key))
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.get().map(|cache| cache.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache.get() {
            cache.clear();
        }
    }

    pub(crate) fn cache_put(&self, db: &FlowDatabase, model: &A::Model) -> FlowResult<()> {
        if !self.is_caching_enabled() {
            return Ok(());
        }
        let key = self.adapter.caching_id_from_model(model, db.converters())?;
        self.cache()?.put(key, model.clone());
        Ok(())
    }

    pub(crate) fn cache_evict(&self, values: &[SqlValue]) -> FlowResult<()> {
        if !self.is_caching_enabled() {
            return Ok(());
        }
        let key = self.adapter.caching_id(values)?;
        self.cache()?.remove(&key);
        Ok(())
    }
}

impl<A: InternalAdapter> CursorLoader for ModelAdapter<A> {
    type Model = A::Model;

    fn load_row(&self, db: &FlowDatabase, cursor: &Cursor) -> FlowResult<A::Model> {
        if !self.is_caching_enabled() {
            return self.adapter.load_new(db, cursor);
        }
        let key = self.adapter.caching_id_from_cursor(cursor)?;
        let cache = self.cache()?;
        if let Some(model) = cache.get(&key) {
            return Ok(model);
        }
        let model = self.adapter.load_new(db, cursor)?;
        cache.put(key, model.clone());
        Ok(model)
    }
}

impl<A: InternalAdapter> fmt::Debug for ModelAdapter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("table", &self.table_name())
            .field("caching", &self.is_caching_enabled())
            .field("cache_size", &self.cache_size)
            .finish()
    }
}

type AfterLoad<M> = Box<dyn Fn(&FlowDatabase, &M) -> FlowResult<()> + Send + Sync>;

/// 뷰 / query model 어댑터 (읽기 전용)
pub struct QueryModelAdapter<A: RetrievalAdapter> {
    adapter: Arc<A>,
    exists_query: Option<String>,
    load_query: Option<String>,
    /// 테이블 모델이면 로드한 값으로 캐시 갱신
    after_load: Option<AfterLoad<A::Model>>,
}

impl<A: RetrievalAdapter> QueryModelAdapter<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        let structure = adapter.structure();
        let keyed = structure.kind() != &TableKind::QueryModel
            && !structure.primary_key_indices().is_empty();
        let exists_query = keyed.then(|| exists_query(structure));
        let load_query = keyed.then(|| load_query(structure));
        Self {
            adapter,
            exists_query,
            load_query,
            after_load: None,
        }
    }

    /// `load` 성공 후 호출되는 hook
    pub fn with_after_load(
        mut self,
        hook: impl Fn(&FlowDatabase, &A::Model) -> FlowResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_load = Some(Box::new(hook));
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn structure(&self) -> &TableStructure {
        self.adapter.structure()
    }

    pub fn table_name(&self) -> &str {
        self.adapter.table_name()
    }

    fn identity_query<'q>(&self, query: &'q Option<String>) -> FlowResult<&'q str> {
        query.as_deref().ok_or_else(|| {
            FlowError::configuration(
                self.table_name(),
                "model has no primary key to build an identity condition from",
            )
        })
    }

    /// autoincrement 값이 아직 없는 (NULL 또는 0) 모델은 `false`
    pub fn exists(&self, db: &FlowDatabase, model: &A::Model) -> FlowResult<bool> {
        let sql = self.identity_query(&self.exists_query)?;
        if self.structure().autoincrement_index().is_some() {
            let values = self.adapter.primary_key_values(model, db.converters());
            if matches!(values.first(), Some(SqlValue::Null | SqlValue::Integer(0))) {
                return Ok(false);
            }
        }
        let values = self.adapter.identity_values(model, db.converters())?;
        Ok(!db.wrapper().raw_query(sql, &values)?.is_empty())
    }

    pub fn load(&self, db: &FlowDatabase, model: &mut A::Model) -> FlowResult<bool> {
        let sql = self.identity_query(&self.load_query)?;
        let values = self.adapter.identity_values(model, db.converters())?;
        let mut cursor = db.wrapper().raw_query(sql, &values)?;
        if !cursor.move_to_first() {
            return Ok(false);
        }
        self.adapter.load_from_cursor(db, &cursor, model)?;
        if let Some(hook) = &self.after_load {
            hook(db, model)?;
        }
        Ok(true)
    }

    /// 뷰의 모든 행 (query model은 대상 테이블이 없어 misuse)
    pub fn query_all(&self, db: &FlowDatabase) -> FlowResult<Vec<A::Model>> {
        if self.structure().kind() == &TableKind::QueryModel {
            return Err(FlowError::misuse(
                format!("QueryModelAdapter<{}>", self.table_name()),
                "query models have no backing table; run a statement with query_list",
            ));
        }
        let mut cursor = db.wrapper().raw_query(&select().from(self.table_name()).query(), &[])?;
        self.load_list(db, &mut cursor)
    }
}

impl<A: RetrievalAdapter> CursorLoader for QueryModelAdapter<A> {
    type Model = A::Model;

    fn load_row(&self, db: &FlowDatabase, cursor: &Cursor) -> FlowResult<A::Model> {
        self.adapter.load_new(db, cursor)
    }
}

impl<A: RetrievalAdapter> fmt::Debug for QueryModelAdapter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryModelAdapter")
            .field("table", &self.table_name())
            .finish()
    }
}
