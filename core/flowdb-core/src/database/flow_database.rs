//! FlowDatabase: 데이터베이스 컨텍스트
//!
//! 저장소 연결, 어댑터 등록부, type converter, 변경 알림, 마이그레이션을 한 곳에서 소유합니다.
//! 전역 상태 없이 인스턴스마다 독립적이므로 한 프로세스에서 여러 데이터베이스를 열 수 있습니다.
//!
//! ```rust
//! use flowdb_core::{FlowConfig, FlowDatabase};
//!
//! let db = FlowDatabase::open_in_memory(FlowConfig::default()).unwrap();
//! db.wrapper().exec_sql("CREATE TABLE t(id INTEGER PRIMARY KEY)").unwrap();
//! db.close().unwrap();
//! ```

use crate::config::FlowConfig;
use crate::converter::{TypeConverter, TypeConverterRegistry};
use crate::database::{DatabaseWrapper, SqliteDatabase, execute_transaction};
use crate::error::{FlowError, FlowResult};
use crate::model::{InternalAdapter, ModelAdapter, QueryModelAdapter, RetrievalAdapter};
use crate::notify::{Action, TableNotifier};
use crate::sql::migration::{Migration, MigrationRunner};
use crate::value::SqlValue;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 어댑터 타입(`ModelAdapter<A>` 등)의 TypeId로 조회
type AdapterMap = DashMap<TypeId, Arc<dyn Any + Send + Sync>, ahash::RandomState>;

pub struct FlowDatabase {
    config: FlowConfig,
    wrapper: Arc<dyn DatabaseWrapper>,
    converters: TypeConverterRegistry,
    /// 테이블 모델 어댑터 (`ModelAdapter<A>`)
    model_adapters: AdapterMap,
    /// 읽기 어댑터 (`QueryModelAdapter<A>`), 테이블 모델 포함
    query_adapters: AdapterMap,
    /// 등록 순서대로 실행되는 (이름, DDL)
    creation_queries: Mutex<Vec<(String, String)>>,
    migrations: MigrationRunner,
    notifier: TableNotifier,
}

impl FlowDatabase {
    pub fn new(wrapper: Arc<dyn DatabaseWrapper>, config: FlowConfig) -> Self {
        let notifier = TableNotifier::new(config.fine_grained_notifications);
        notifier.set_enabled(config.notify_changes);
        Self {
            config,
            wrapper,
            converters: TypeConverterRegistry::with_defaults(),
            model_adapters: DashMap::default(),
            query_adapters: DashMap::default(),
            creation_queries: Mutex::new(Vec::new()),
            migrations: MigrationRunner::new(),
            notifier,
        }
    }

    pub fn open_in_memory(config: FlowConfig) -> FlowResult<Self> {
        Ok(Self::new(Arc::new(SqliteDatabase::open_in_memory()?), config))
    }

    #[instrument(skip(path, config), fields(name = %config.database_name))]
    pub fn open(path: impl AsRef<Path>, config: FlowConfig) -> FlowResult<Self> {
        Ok(Self::new(Arc::new(SqliteDatabase::open(path)?), config))
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.database_name
    }

    pub fn wrapper(&self) -> &dyn DatabaseWrapper {
        self.wrapper.as_ref()
    }

    pub fn shared_wrapper(&self) -> Arc<dyn DatabaseWrapper> {
        Arc::clone(&self.wrapper)
    }

    pub fn converters(&self) -> &TypeConverterRegistry {
        &self.converters
    }

    pub fn register_converter<C: TypeConverter>(&self, converter: C) {
        self.converters.register(converter);
    }

    pub fn notifier(&self) -> &TableNotifier {
        &self.notifier
    }

    /// 테이블 모델 등록. 구조의 DDL은 [`create_tables`](Self::create_tables)에서 실행됩니다.
    pub fn register_table<A: InternalAdapter>(&self, adapter: A) -> FlowResult<Arc<ModelAdapter<A>>> {
        let adapter = Arc::new(adapter);
        let structure = adapter.structure();
        let cache_size = structure
            .cache_size()
            .unwrap_or(self.config.default_cache_size);
        let model_adapter = Arc::new(ModelAdapter::new(Arc::clone(&adapter), cache_size)?);
        self.push_creation_query(structure.name(), structure.creation_query());
        info!(table = structure.name(), caching = adapter.caching_enabled(), "registered table");

        self.model_adapters
            .insert(TypeId::of::<ModelAdapter<A>>(), model_adapter.clone());
        let cached = Arc::clone(&model_adapter);
        let query_adapter = QueryModelAdapter::new(adapter)
            .with_after_load(move |db, model| cached.cache_put(db, model));
        self.query_adapters
            .insert(TypeId::of::<QueryModelAdapter<A>>(), Arc::new(query_adapter));
        Ok(model_adapter)
    }

    /// 뷰 / query model 등록 (읽기 전용)
    pub fn register_query_model<A: RetrievalAdapter>(&self, adapter: A) -> Arc<QueryModelAdapter<A>> {
        let adapter = Arc::new(adapter);
        let structure = adapter.structure();
        self.push_creation_query(structure.name(), structure.creation_query());
        debug!(name = structure.name(), kind = ?structure.kind(), "registered query model");

        let query_adapter = Arc::new(QueryModelAdapter::new(adapter));
        self.query_adapters
            .insert(TypeId::of::<QueryModelAdapter<A>>(), query_adapter.clone());
        query_adapter
    }

    fn push_creation_query(&self, name: &str, ddl: Option<&str>) {
        if let Some(ddl) = ddl {
            let mut queries = self.creation_queries.lock();
            queries.retain(|(existing, _)| existing != name);
            queries.push((name.to_string(), ddl.to_string()));
        }
    }

    pub fn model_adapter<A: InternalAdapter>(&self) -> FlowResult<Arc<ModelAdapter<A>>> {
        lookup(&self.model_adapters, type_name::<A>())
    }

    /// 테이블 모델도 읽기 어댑터로 조회할 수 있습니다.
    pub fn query_model_adapter<A: RetrievalAdapter>(&self) -> FlowResult<Arc<QueryModelAdapter<A>>> {
        lookup(&self.query_adapters, type_name::<A>())
    }

    pub fn is_registered<A: RetrievalAdapter>(&self) -> bool {
        self.query_adapters
            .contains_key(&TypeId::of::<QueryModelAdapter<A>>())
    }

    /// 등록된 DDL 이름 (등록 순서)
    pub fn table_names(&self) -> Vec<String> {
        self.creation_queries
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 등록된 모든 테이블/뷰를 한 저장소 트랜잭션에서 생성
    #[instrument(skip(self), fields(name = %self.config.database_name))]
    pub fn create_tables(&self) -> FlowResult<()> {
        let queries = self.creation_queries.lock().clone();
        execute_transaction(self.wrapper(), |wrapper| {
            for (name, ddl) in &queries {
                debug!(name, "creating");
                wrapper.exec_sql(ddl)?;
            }
            Ok(())
        })?;
        info!(count = queries.len(), "tables created");
        Ok(())
    }

    /// `version`으로 올라갈 때 실행할 마이그레이션
    pub fn add_migration(&self, version: i32, migration: impl Migration + 'static) {
        self.migrations.add(version, migration);
    }

    pub fn migrations(&self) -> &MigrationRunner {
        &self.migrations
    }

    /// `(old, new]` 버전의 마이그레이션 실행 후 저장된 버전 갱신
    pub fn migrate(&self, old_version: i32, new_version: i32) -> FlowResult<()> {
        self.migrations.migrate(self, old_version, new_version)
    }

    /// 새 데이터베이스(버전 0)면 테이블을 만들고, 저장된 버전부터 `version`까지 마이그레이션합니다.
    #[instrument(skip(self), fields(name = %self.config.database_name))]
    pub fn initialize(&self, version: i32) -> FlowResult<()> {
        let current = self.wrapper.version()?;
        if current == 0 {
            self.create_tables()?;
        }
        if current < version {
            self.migrate(current, version)?;
        }
        info!(from = current, to = version, "database ready");
        Ok(())
    }

    /// 저장소 트랜잭션 안에서 `body` 실행
    ///
    /// 구간 안의 변경 알림은 커밋 시 한 번에 전달되고, 롤백되면 버려집니다.
    pub fn execute_transaction<R>(
        &self,
        body: impl FnOnce(&FlowDatabase) -> FlowResult<R>,
    ) -> FlowResult<R> {
        let span = self.notifier.batch();
        let result = execute_transaction(self.wrapper(), |_| body(self));
        span.finish(result.is_ok());
        result
    }

    /// 테이블 변경 알림 (설정에서 꺼져 있으면 무시)
    pub fn notify_change(&self, table: &str, action: Action) {
        self.notifier.notify(table, action);
    }

    /// 외래 키 해석에 사용하는 primary key 조회 (캐시 우선)
    pub fn load_by_primary_key<A: InternalAdapter>(
        &self,
        values: &[SqlValue],
    ) -> FlowResult<Option<A::Model>> {
        self.model_adapter::<A>()?.load_by_primary_key(self, values)
    }

    #[instrument(skip(self), fields(name = %self.config.database_name))]
    pub fn close(&self) -> FlowResult<()> {
        self.model_adapters.clear();
        self.query_adapters.clear();
        self.wrapper.close()?;
        info!("database closed");
        Ok(())
    }
}

fn lookup<T: Send + Sync + 'static>(map: &AdapterMap, name: &str) -> FlowResult<Arc<T>> {
    let entry = map
        .get(&TypeId::of::<T>())
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| FlowError::MissingAdapter(name.to_string()))?;
    entry
        .downcast::<T>()
        .map_err(|_| FlowError::MissingAdapter(name.to_string()))
}

impl fmt::Debug for FlowDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDatabase")
            .field("name", &self.config.database_name)
            .field("tables", &self.table_names())
            .field("notifier", &self.notifier)
            .finish()
    }
}
