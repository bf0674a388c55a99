//! 모델 계층
//!
//! - [`structure`]: 컬럼/테이블 정의
//! - [`adapter`]: 어댑터 계약 (읽기/쓰기/로딩)
//! - [`model_adapter`]: 쿼리와 캐시를 소유하는 런타임 어댑터
//! - [`cache`]: primary key → model 캐시
//!
//! 모델 타입은 [`Model`] (식별/조회)을 구현하고, 테이블 모델은 추가로 [`MutableModel`]을
//! 구현합니다. 뷰와 query model은 `MutableModel`을 구현하지 않습니다.

pub mod adapter;
pub mod cache;
pub mod model_adapter;
pub mod structure;

pub use adapter::{CursorLoader, InternalAdapter, RetrievalAdapter};
pub use cache::{
    CacheKey, CacheStats, KeyPart, LruModelCache, ModelCache, MultiKeyCacheConverter,
    SimpleMapCache,
};
pub use model_adapter::{ModelAdapter, QueryModelAdapter};
pub use structure::{
    Column, ColumnRole, ForeignKeyAction, ForeignKeyReference, TableKind, TableStructure,
    TableStructureBuilder,
};

use crate::database::FlowDatabase;
use crate::error::FlowResult;
use crate::sql_utils::{SaveMode, SaveOutcome};

/// 식별 가능한 모델 (primary key 조건, 존재 확인, 로드)
///
/// 어댑터는 [`FlowDatabase`]에 등록되어 있어야 합니다. 조회는 캐시를 거치지 않습니다.
pub trait Model: Clone + Send + Sync + Sized + 'static {
    type Adapter: RetrievalAdapter<Model = Self>;

    fn exists(&self, db: &FlowDatabase) -> FlowResult<bool> {
        db.query_model_adapter::<Self::Adapter>()?.exists(db, self)
    }

    /// 저장소 값으로 필드를 다시 채웁니다. 행이 없으면 `false`.
    fn load(&mut self, db: &FlowDatabase) -> FlowResult<bool> {
        db.query_model_adapter::<Self::Adapter>()?.load(db, self)
    }
}

/// 테이블 모델의 변경 기능
pub trait MutableModel: Model
where
    Self::Adapter: InternalAdapter,
{
    fn save(&mut self, db: &FlowDatabase) -> FlowResult<SaveOutcome> {
        db.model_adapter::<Self::Adapter>()?.save(db, self)
    }

    fn save_with_mode(&mut self, db: &FlowDatabase, mode: SaveMode) -> FlowResult<SaveOutcome> {
        db.model_adapter::<Self::Adapter>()?.save_with_mode(db, self, mode)
    }

    fn insert(&mut self, db: &FlowDatabase) -> FlowResult<i64> {
        db.model_adapter::<Self::Adapter>()?.insert(db, self)
    }

    fn update(&mut self, db: &FlowDatabase) -> FlowResult<usize> {
        db.model_adapter::<Self::Adapter>()?.update(db, self)
    }

    fn delete(&self, db: &FlowDatabase) -> FlowResult<bool> {
        db.model_adapter::<Self::Adapter>()?.delete(db, self)
    }
}
