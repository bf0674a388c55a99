//! 어댑터 계약
//!
//! 모델 타입마다 하나의 어댑터가 테이블 구조, cursor 로딩, 값 바인딩을 제공합니다.
//! 런타임은 리플렉션 없이 이 트레이트만 사용합니다.
//!
//! - [`RetrievalAdapter`]: 읽기 (cursor → model, primary key 조건)
//! - [`InternalAdapter`]: 쓰기 (model → statement / content values)
//! - [`CursorLoader`]: cursor에서 단일/목록 로딩 전략

use crate::converter::TypeConverterRegistry;
use crate::database::{ContentValues, Cursor, DatabaseStatement, FlowDatabase};
use crate::error::{FlowError, FlowResult};
use crate::model::cache::{CacheKey, MultiKeyCacheConverter};
use crate::model::structure::TableStructure;
use crate::sql::condition::{Condition, ConditionGroup};
use crate::value::SqlValue;

/// 읽기 어댑터
pub trait RetrievalAdapter: Send + Sync + 'static {
    type Model: Clone + Send + Sync + 'static;

    fn structure(&self) -> &TableStructure;

    fn table_name(&self) -> &str {
        self.structure().name()
    }

    /// 빈 모델 인스턴스
    fn new_instance(&self) -> Self::Model;

    /// 현재 행의 모든 컬럼 값을 모델에 할당합니다.
    ///
    /// 외래 키는 [`FlowDatabase::load_by_primary_key`]로 참조 테이블에서 읽어옵니다.
    fn load_from_cursor(
        &self,
        db: &FlowDatabase,
        cursor: &Cursor,
        model: &mut Self::Model,
    ) -> FlowResult<()>;

    /// Primary key 값 (선언 순서). 키가 없는 query model은 빈 벡터.
    fn primary_key_values(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> Vec<SqlValue>;

    /// 캐싱 지원 여부 (어댑터 생성 시 결정)
    fn caching_enabled(&self) -> bool {
        false
    }

    /// 복합 키 캐시 변환기
    fn cache_key_converter(&self) -> Option<&dyn MultiKeyCacheConverter> {
        None
    }

    /// 새 인스턴스에 현재 행을 로드
    fn load_new(&self, db: &FlowDatabase, cursor: &Cursor) -> FlowResult<Self::Model> {
        let mut model = self.new_instance();
        self.load_from_cursor(db, cursor, &mut model)?;
        Ok(model)
    }

    /// 개수와 NULL을 검사한 primary key 값
    fn identity_values(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Vec<SqlValue>> {
        let values = self.primary_key_values(model, converters);
        check_identity(self.structure(), &values)?;
        Ok(values)
    }

    /// `pk1`=v1 AND `pk2`=v2 ...
    fn primary_condition_for_values(&self, values: &[SqlValue]) -> FlowResult<ConditionGroup> {
        let structure = self.structure();
        check_identity(structure, values)?;
        Ok(ConditionGroup::of(
            structure
                .primary_key_columns()
                .zip(values)
                .map(|(column, value)| Condition::column(column.name()).is(value)),
        ))
    }

    /// 모델의 현재 primary key 값으로 만든 identity 조건
    fn primary_condition_clause(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<ConditionGroup> {
        self.primary_condition_for_values(&self.primary_key_values(model, converters))
    }

    /// primary key 값 → 캐시 키
    fn caching_id(&self, values: &[SqlValue]) -> FlowResult<CacheKey> {
        if !self.caching_enabled() {
            return Err(FlowError::CachingNotEnabled {
                table: self.table_name().to_string(),
            });
        }
        Ok(match self.cache_key_converter() {
            Some(converter) => converter.cache_key(values),
            None => CacheKey::from_values(values),
        })
    }

    fn caching_id_from_model(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<CacheKey> {
        let values = self.identity_values(model, converters)?;
        self.caching_id(&values)
    }

    /// Cursor 현재 행의 primary key 컬럼으로 만든 캐시 키
    fn caching_id_from_cursor(&self, cursor: &Cursor) -> FlowResult<CacheKey> {
        if !self.caching_enabled() {
            return Err(FlowError::CachingNotEnabled {
                table: self.table_name().to_string(),
            });
        }
        let values = self
            .structure()
            .primary_key_columns()
            .map(|column| cursor.value(column.name()).cloned())
            .collect::<FlowResult<Vec<_>>>()?;
        self.caching_id(&values)
    }
}

fn check_identity(structure: &TableStructure, values: &[SqlValue]) -> FlowResult<()> {
    let expected = structure.primary_key_indices().len();
    if expected == 0 {
        return Err(FlowError::configuration(
            structure.name(),
            "model has no primary key to build an identity condition from",
        ));
    }
    if values.len() != expected {
        return Err(FlowError::configuration(
            structure.name(),
            format!(
                "adapter returned {} primary key values for {expected} primary key columns",
                values.len()
            ),
        ));
    }
    if let Some((column, _)) = structure
        .primary_key_columns()
        .zip(values)
        .find(|(_, value)| value.is_null())
    {
        return Err(FlowError::PrimaryKeyCannotBeNull {
            table: structure.name().to_string(),
            column: column.name().to_string(),
        });
    }
    Ok(())
}

/// 쓰기 어댑터
///
/// 바인딩 순서는 컬럼 선언 순서이며, 모든 컬럼이 정확히 한 번씩 바인딩되어야 합니다.
pub trait InternalAdapter: RetrievalAdapter {
    /// 모든 컬럼 값 (선언 순서, converter 적용 후)
    fn column_values(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> Vec<SqlValue>;

    /// INSERT 후 생성된 row id를 모델에 반영
    ///
    /// autoincrement 컬럼이 있는 테이블은 반드시 구현해야 합니다.
    fn update_auto_increment(&self, _model: &mut Self::Model, _id: i64) {}

    /// 개수를 검사한 컬럼 값
    fn bound_values(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Vec<SqlValue>> {
        let values = self.column_values(model, converters);
        let expected = self.structure().columns().len();
        if values.len() != expected {
            return Err(FlowError::configuration(
                self.table_name(),
                format!("adapter bound {} values for {expected} columns", values.len()),
            ));
        }
        Ok(values)
    }

    /// autoincrement 컬럼의 현재 값 (없거나 NULL이면 `None`)
    fn auto_incrementing_id(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Option<i64>> {
        let Some(index) = self.structure().autoincrement_index() else {
            return Ok(None);
        };
        let values = self.bound_values(model, converters)?;
        Ok(values[index].as_i64())
    }

    /// INSERT용 값 (autoincrement 컬럼 제외)
    fn insert_values(
        &self,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Vec<SqlValue>> {
        let mut values = self.bound_values(model, converters)?;
        if let Some(index) = self.structure().autoincrement_index() {
            values.remove(index);
        }
        Ok(values)
    }

    /// 모든 컬럼을 1번부터 바인딩
    fn bind_to_statement(
        &self,
        statement: &mut DatabaseStatement<'_>,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        statement.bind_all(self.bound_values(model, converters)?);
        Ok(())
    }

    /// autoincrement 컬럼을 건너뛰고 바인딩 (엔진이 값을 할당)
    fn bind_to_insert_statement(
        &self,
        statement: &mut DatabaseStatement<'_>,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        statement.bind_all(self.insert_values(model, converters)?);
        Ok(())
    }

    /// SET 절용 전체 컬럼, 이어서 WHERE 절용 primary key 값
    fn bind_to_update_statement(
        &self,
        statement: &mut DatabaseStatement<'_>,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        let mut values = self.bound_values(model, converters)?;
        values.extend(self.identity_values(model, converters)?);
        statement.bind_all(values);
        Ok(())
    }

    fn bind_to_delete_statement(
        &self,
        statement: &mut DatabaseStatement<'_>,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        statement.bind_all(self.identity_values(model, converters)?);
        Ok(())
    }

    fn bind_to_content_values(
        &self,
        values: &mut ContentValues,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        let bound = self.bound_values(model, converters)?;
        for (column, value) in self.structure().columns().iter().zip(bound) {
            values.put(column.name(), value);
        }
        Ok(())
    }

    /// autoincrement 컬럼을 제외한 content values
    fn bind_to_insert_values(
        &self,
        values: &mut ContentValues,
        model: &Self::Model,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<()> {
        let bound = self.bound_values(model, converters)?;
        for (column, value) in self.structure().columns().iter().zip(bound) {
            if !column.is_autoincrement() {
                values.put(column.name(), value);
            }
        }
        Ok(())
    }
}

/// Cursor 로딩 전략
pub trait CursorLoader {
    type Model;

    /// 현재 행을 모델로
    fn load_row(&self, db: &FlowDatabase, cursor: &Cursor) -> FlowResult<Self::Model>;

    fn load_list(&self, db: &FlowDatabase, cursor: &mut Cursor) -> FlowResult<Vec<Self::Model>> {
        let mut models = Vec::with_capacity(cursor.count());
        if cursor.move_to_first() {
            loop {
                models.push(self.load_row(db, cursor)?);
                if !cursor.move_to_next() {
                    break;
                }
            }
        }
        Ok(models)
    }

    fn load_single(&self, db: &FlowDatabase, cursor: &mut Cursor) -> FlowResult<Option<Self::Model>> {
        if cursor.move_to_first() {
            Ok(Some(self.load_row(db, cursor)?))
        } else {
            Ok(None)
        }
    }
}
