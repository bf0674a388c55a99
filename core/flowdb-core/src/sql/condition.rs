//! Conditions: WHERE/HAVING/ON/SET 절을 구성하는 술어
//!
//! # 구성 요소
//!
//! - [`Condition`]: `column <op> value` 한 개
//! - [`BetweenCondition`], [`InCondition`], [`ExistenceCondition`]
//! - [`ConditionGroup`]: 술어 목록 (AND/OR 또는 쉼표로 연결)
//! - [`CombinedCondition`]: 이진 트리, 각 노드는 괄호로 감싸짐
//!
//! # Empty params
//!
//! [`Operand::Param`]은 렌더링 시 `?`가 되는 자리표시자입니다.
//! [`ConditionGroup::replace_empty_params`]로 나중에 실제 값으로 치환합니다.
//! 문자열 `"?"` 값과는 구별됩니다.

use crate::converter::TypeConverterRegistry;
use crate::error::{FlowError, FlowResult};
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use crate::value::SqlValue;
use std::sync::OnceLock;

// ════════════════════════════════════════════
// Operand
// ════════════════════════════════════════════

/// 조건의 오른쪽 값
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// 리터럴로 렌더링되는 값
    Value(SqlValue),
    /// 나중에 치환되는 empty param (`?`)
    Param,
    /// 그대로 출력 (컬럼 참조, 함수 호출)
    Raw(String),
    /// 괄호로 감싼 서브쿼리
    Query(String),
}

impl Operand {
    pub fn param() -> Self {
        Operand::Param
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Operand::Raw(sql.into())
    }

    /// 다른 컬럼 참조 (`` `t`.`col` ``)
    pub fn column(name: &str) -> Self {
        Operand::Raw(quote_identifier(name))
    }

    pub fn query(query: &impl Query) -> Self {
        Operand::Query(query.query())
    }

    /// 등록된 type converter로 변환한 값. 변환기가 없으면 `Configuration` 오류.
    pub fn converted<T: 'static>(value: &T, converters: &TypeConverterRegistry) -> FlowResult<Self> {
        converters.require_db(value).map(Operand::Value)
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Operand::Param)
    }

    pub fn render(&self) -> String {
        match self {
            Operand::Value(v) => v.to_sql_literal(),
            Operand::Param => "?".to_string(),
            Operand::Raw(sql) => sql.clone(),
            Operand::Query(sql) => format!("({sql})"),
        }
    }
}

macro_rules! impl_operand_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(SqlValue::from(v))
                }
            }
        )*
    };
}

impl_operand_from!(i8, i16, i32, i64, u8, u16, u32, isize, bool, f32, f64, String, Vec<u8>);

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Value(SqlValue::from(v))
    }
}

impl From<&String> for Operand {
    fn from(v: &String) -> Self {
        Operand::Value(SqlValue::from(v))
    }
}

impl From<&[u8]> for Operand {
    fn from(v: &[u8]) -> Self {
        Operand::Value(SqlValue::from(v))
    }
}

impl From<SqlValue> for Operand {
    fn from(v: SqlValue) -> Self {
        Operand::Value(v)
    }
}

impl From<&SqlValue> for Operand {
    fn from(v: &SqlValue) -> Self {
        Operand::Value(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(SqlValue::from(v))
    }
}

// ════════════════════════════════════════════
// Operators / Collate / Separator
// ════════════════════════════════════════════

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Greater,
    GreaterOrEq,
    Less,
    LessOrEq,
    Like,
    NotLike,
    Glob,
    IsNull,
    IsNotNull,
    /// `col=col || value`
    Concatenate,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Greater => ">",
            Operator::GreaterOrEq => ">=",
            Operator::Less => "<",
            Operator::LessOrEq => "<=",
            Operator::Like => " LIKE ",
            Operator::NotLike => " NOT LIKE ",
            Operator::Glob => " GLOB ",
            Operator::IsNull => " IS NULL",
            Operator::IsNotNull => " IS NOT NULL",
            Operator::Concatenate => "=",
        }
    }
}

/// SQLite 기본 collation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collate {
    Binary,
    NoCase,
    RTrim,
}

impl Collate {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Collate::Binary => "BINARY",
            Collate::NoCase => "NOCASE",
            Collate::RTrim => "RTRIM",
        }
    }
}

/// 술어 사이의 논리 연결자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    And,
    Or,
}

impl Separator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Separator::And => "AND",
            Separator::Or => "OR",
        }
    }
}

// ════════════════════════════════════════════
// Condition
// ════════════════════════════════════════════

/// 조건의 왼쪽 컬럼. [`Condition::column`]으로 시작합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    rendered: String,
}

impl ColumnRef {
    fn op(self, operator: Operator, value: Option<Operand>) -> Condition {
        Condition {
            column: self.rendered,
            operator,
            value,
            collation: None,
            post_argument: None,
            separator: None,
        }
    }

    pub fn is(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::Eq, Some(value.into()))
    }

    pub fn is_not(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::NotEq, Some(value.into()))
    }

    pub fn greater_than(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::Greater, Some(value.into()))
    }

    pub fn greater_than_or_eq(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::GreaterOrEq, Some(value.into()))
    }

    pub fn less_than(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::Less, Some(value.into()))
    }

    pub fn less_than_or_eq(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::LessOrEq, Some(value.into()))
    }

    pub fn like(self, pattern: impl Into<Operand>) -> Condition {
        self.op(Operator::Like, Some(pattern.into()))
    }

    pub fn not_like(self, pattern: impl Into<Operand>) -> Condition {
        self.op(Operator::NotLike, Some(pattern.into()))
    }

    pub fn glob(self, pattern: impl Into<Operand>) -> Condition {
        self.op(Operator::Glob, Some(pattern.into()))
    }

    pub fn is_null(self) -> Condition {
        self.op(Operator::IsNull, None)
    }

    pub fn is_not_null(self) -> Condition {
        self.op(Operator::IsNotNull, None)
    }

    /// `col=col || value` (UPDATE SET 절에서 사용)
    pub fn concatenate(self, value: impl Into<Operand>) -> Condition {
        self.op(Operator::Concatenate, Some(value.into()))
    }

    pub fn between(self, low: impl Into<Operand>) -> BetweenStart {
        BetweenStart {
            column: self.rendered,
            low: low.into(),
        }
    }

    pub fn is_in<I, T>(self, values: I) -> InCondition
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        InCondition::new(self.rendered, false, InValues::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_not_in<I, T>(self, values: I) -> InCondition
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        InCondition::new(self.rendered, true, InValues::List(values.into_iter().map(Into::into).collect()))
    }

    /// 모델 타입 값을 type converter로 변환해 비교
    pub fn converted<T: 'static>(
        self,
        operator: Operator,
        value: &T,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Condition> {
        Ok(self.op(operator, Some(Operand::converted(value, converters)?)))
    }

    pub fn is_converted<T: 'static>(self, value: &T, converters: &TypeConverterRegistry) -> FlowResult<Condition> {
        self.converted(Operator::Eq, value, converters)
    }

    pub fn greater_than_converted<T: 'static>(
        self,
        value: &T,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Condition> {
        self.converted(Operator::Greater, value, converters)
    }

    pub fn less_than_converted<T: 'static>(
        self,
        value: &T,
        converters: &TypeConverterRegistry,
    ) -> FlowResult<Condition> {
        self.converted(Operator::Less, value, converters)
    }

    pub fn is_in_converted<'a, I, T>(self, values: I, converters: &TypeConverterRegistry) -> FlowResult<InCondition>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'static,
    {
        let operands = values
            .into_iter()
            .map(|value| Operand::converted(value, converters))
            .collect::<FlowResult<Vec<_>>>()?;
        Ok(InCondition::new(self.rendered, false, InValues::List(operands)))
    }

    /// `col IN (SELECT ...)`
    pub fn in_query(self, query: &impl Query) -> InCondition {
        InCondition::new(self.rendered, false, InValues::Query(query.query()))
    }

    pub fn not_in_query(self, query: &impl Query) -> InCondition {
        InCondition::new(self.rendered, true, InValues::Query(query.query()))
    }
}

/// `column <operator> value` 술어
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    operator: Operator,
    value: Option<Operand>,
    collation: Option<Collate>,
    post_argument: Option<String>,
    separator: Option<Separator>,
}

impl Condition {
    /// 컬럼 이름으로 시작 (quote 처리됨)
    pub fn column(name: &str) -> ColumnRef {
        ColumnRef {
            rendered: quote_identifier(name),
        }
    }

    /// 식 그대로 시작 (`LENGTH(name)` 등)
    pub fn raw_column(expression: impl Into<String>) -> ColumnRef {
        ColumnRef {
            rendered: expression.into(),
        }
    }

    pub fn collate(mut self, collation: Collate) -> Self {
        self.collation = Some(collation);
        self
    }

    /// 조건 뒤에 그대로 덧붙는 텍스트
    pub fn post_argument(mut self, text: impl Into<String>) -> Self {
        self.post_argument = Some(text.into());
        self
    }

    /// 다음 술어와의 연결자
    pub fn separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> Option<&Operand> {
        self.value.as_ref()
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    fn render(&self, out: &mut QueryBuilder) {
        out.append(&self.column);
        if self.operator == Operator::Concatenate {
            out.append("=").append(&self.column).append(" || ");
        } else {
            out.append(self.operator.as_sql());
        }
        if let Some(value) = &self.value {
            out.append(value.render());
        }
        if let Some(collation) = self.collation {
            out.append(" COLLATE ").append(collation.as_sql());
        }
        if let Some(post) = &self.post_argument {
            out.append_space().append(post);
        }
    }
}

impl Query for Condition {
    fn query(&self) -> String {
        let mut out = QueryBuilder::new();
        self.render(&mut out);
        out.into_query()
    }
}

/// `between(low)` 이후 `and(high)`를 기다리는 상태
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenStart {
    column: String,
    low: Operand,
}

impl BetweenStart {
    pub fn and(self, high: impl Into<Operand>) -> BetweenCondition {
        BetweenCondition {
            column: self.column,
            low: self.low,
            high: high.into(),
            separator: None,
        }
    }
}

/// `column BETWEEN low AND high`
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenCondition {
    column: String,
    low: Operand,
    high: Operand,
    separator: Option<Separator>,
}

impl BetweenCondition {
    pub fn separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }

    fn render(&self, out: &mut QueryBuilder) {
        out.append(&self.column)
            .append(" BETWEEN ")
            .append(self.low.render())
            .append(" AND ")
            .append(self.high.render());
    }
}

#[derive(Debug, Clone, PartialEq)]
enum InValues {
    List(Vec<Operand>),
    Query(String),
}

/// `column [NOT] IN (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct InCondition {
    column: String,
    negated: bool,
    values: InValues,
    separator: Option<Separator>,
}

impl InCondition {
    fn new(column: String, negated: bool, values: InValues) -> Self {
        Self {
            column,
            negated,
            values,
            separator: None,
        }
    }

    /// 값 추가 (목록 형태일 때만)
    pub fn and(mut self, value: impl Into<Operand>) -> Self {
        if let InValues::List(list) = &mut self.values {
            list.push(value.into());
        }
        self
    }

    pub fn separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }

    fn render(&self, out: &mut QueryBuilder) {
        out.append(&self.column);
        out.append(if self.negated { " NOT IN " } else { " IN " });
        match &self.values {
            InValues::List(list) => {
                out.append_parenthesis_enclosed(
                    list.iter().map(Operand::render).collect::<Vec<_>>().join(","),
                );
            }
            InValues::Query(sql) => {
                out.append_parenthesis_enclosed(sql);
            }
        }
    }
}

/// `[NOT] EXISTS (subquery)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceCondition {
    query: String,
    negated: bool,
}

impl ExistenceCondition {
    pub fn exists(query: &impl Query) -> Self {
        Self {
            query: query.query(),
            negated: false,
        }
    }

    pub fn not_exists(query: &impl Query) -> Self {
        Self {
            query: query.query(),
            negated: true,
        }
    }
}

// ════════════════════════════════════════════
// Predicate
// ════════════════════════════════════════════

/// 그룹에 들어갈 수 있는 모든 술어
#[derive(Debug, Clone)]
pub enum Predicate {
    Condition(Condition),
    Between(BetweenCondition),
    In(InCondition),
    Exists(ExistenceCondition),
    /// 괄호로 감싸서 렌더링
    Group(ConditionGroup),
    Combined(CombinedCondition),
    Raw(String),
}

impl Predicate {
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Raw(sql.into())
    }

    fn separator(&self) -> Option<Separator> {
        match self {
            Predicate::Condition(c) => c.separator,
            Predicate::Between(c) => c.separator,
            Predicate::In(c) => c.separator,
            _ => None,
        }
    }

    fn render(&self, out: &mut QueryBuilder) {
        match self {
            Predicate::Condition(c) => c.render(out),
            Predicate::Between(c) => c.render(out),
            Predicate::In(c) => c.render(out),
            Predicate::Exists(c) => {
                if c.negated {
                    out.append("NOT ");
                }
                out.append("EXISTS ").append_parenthesis_enclosed(&c.query);
            }
            Predicate::Group(group) => {
                out.append_parenthesis_enclosed(group.query());
            }
            Predicate::Combined(combined) => combined.render(out),
            Predicate::Raw(sql) => {
                out.append(sql);
            }
        }
    }

    fn for_each_operand(&self, f: &mut dyn FnMut(&Operand)) {
        match self {
            Predicate::Condition(c) => {
                if let Some(v) = &c.value {
                    f(v);
                }
            }
            Predicate::Between(c) => {
                f(&c.low);
                f(&c.high);
            }
            Predicate::In(c) => {
                if let InValues::List(list) = &c.values {
                    list.iter().for_each(|v| f(v));
                }
            }
            Predicate::Group(group) => group.for_each_operand(f),
            Predicate::Combined(combined) => combined.for_each_operand(f),
            Predicate::Exists(_) | Predicate::Raw(_) => {}
        }
    }

    fn for_each_operand_mut(&mut self, f: &mut dyn FnMut(&mut Operand)) {
        match self {
            Predicate::Condition(c) => {
                if let Some(v) = &mut c.value {
                    f(v);
                }
            }
            Predicate::Between(c) => {
                f(&mut c.low);
                f(&mut c.high);
            }
            Predicate::In(c) => {
                if let InValues::List(list) = &mut c.values {
                    list.iter_mut().for_each(|v| f(v));
                }
            }
            Predicate::Group(group) => group.for_each_operand_mut(f),
            Predicate::Combined(combined) => combined.for_each_operand_mut(f),
            Predicate::Exists(_) | Predicate::Raw(_) => {}
        }
    }
}

impl Query for Predicate {
    fn query(&self) -> String {
        let mut out = QueryBuilder::new();
        self.render(&mut out);
        out.into_query()
    }
}

impl From<Condition> for Predicate {
    fn from(c: Condition) -> Self {
        Predicate::Condition(c)
    }
}

impl From<BetweenCondition> for Predicate {
    fn from(c: BetweenCondition) -> Self {
        Predicate::Between(c)
    }
}

impl From<InCondition> for Predicate {
    fn from(c: InCondition) -> Self {
        Predicate::In(c)
    }
}

impl From<ExistenceCondition> for Predicate {
    fn from(c: ExistenceCondition) -> Self {
        Predicate::Exists(c)
    }
}

impl From<ConditionGroup> for Predicate {
    fn from(g: ConditionGroup) -> Self {
        Predicate::Group(g)
    }
}

impl From<CombinedCondition> for Predicate {
    fn from(c: CombinedCondition) -> Self {
        Predicate::Combined(c)
    }
}

// ════════════════════════════════════════════
// ConditionGroup
// ════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Delimiter {
    #[default]
    Separators,
    Comma,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    predicate: Predicate,
    separator: Option<Separator>,
}

/// 술어 목록
///
/// 렌더링 결과는 첫 `query()` 호출 시 계산되어 캐시되고, 변경 시 무효화됩니다.
#[derive(Debug, Clone, Default)]
pub struct ConditionGroup {
    entries: Vec<GroupEntry>,
    delimiter: Delimiter,
    cached: OnceLock<String>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// UPDATE SET 절처럼 쉼표로 연결되는 그룹
    pub fn comma_separated() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            ..Self::default()
        }
    }

    /// 모든 술어를 AND로 연결
    pub fn of<I, P>(predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self::new().and_all(predicates)
    }

    pub fn and(mut self, predicate: impl Into<Predicate>) -> Self {
        self.push(predicate.into(), Separator::And);
        self
    }

    pub fn or(mut self, predicate: impl Into<Predicate>) -> Self {
        self.push(predicate.into(), Separator::Or);
        self
    }

    pub fn and_all<I, P>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        for p in predicates {
            self.push(p.into(), Separator::And);
        }
        self
    }

    pub fn or_all<I, P>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        for p in predicates {
            self.push(p.into(), Separator::Or);
        }
        self
    }

    /// 이전 술어와 `separator`로 연결하여 추가
    pub fn push(&mut self, predicate: Predicate, separator: Separator) {
        if let Some(last) = self.entries.last_mut() {
            if last.separator.is_none() && last.predicate.separator().is_none() {
                last.separator = Some(separator);
            } else if separator == Separator::Or {
                last.separator = Some(Separator::Or);
            }
        }
        self.entries.push(GroupEntry {
            predicate,
            separator: None,
        });
        self.invalidate();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn invalidate(&mut self) {
        self.cached = OnceLock::new();
    }

    fn render_uncached(&self) -> String {
        let mut out = QueryBuilder::new();
        let last = self.entries.len().saturating_sub(1);
        for (i, entry) in self.entries.iter().enumerate() {
            entry.predicate.render(&mut out);
            if i < last {
                match self.delimiter {
                    Delimiter::Comma => {
                        out.append(",");
                    }
                    Delimiter::Separators => {
                        let separator = entry
                            .separator
                            .or(entry.predicate.separator())
                            .unwrap_or_default();
                        out.append_space_separated(separator.as_sql());
                    }
                }
            }
        }
        out.into_query()
    }

    fn for_each_operand(&self, f: &mut dyn FnMut(&Operand)) {
        for entry in &self.entries {
            entry.predicate.for_each_operand(f);
        }
    }

    fn for_each_operand_mut(&mut self, f: &mut dyn FnMut(&mut Operand)) {
        self.invalidate();
        for entry in &mut self.entries {
            entry.predicate.for_each_operand_mut(f);
        }
    }

    /// `?` 자리표시자 개수
    pub fn empty_param_count(&self) -> usize {
        let mut count = 0;
        self.for_each_operand(&mut |op| {
            if op.is_param() {
                count += 1;
            }
        });
        count
    }

    fn resolved_value_count(&self) -> usize {
        let mut count = 0;
        self.for_each_operand(&mut |op| {
            if matches!(op, Operand::Value(_)) {
                count += 1;
            }
        });
        count
    }

    /// Empty param을 순서대로 치환한 복사본을 반환합니다.
    ///
    /// # Errors
    ///
    /// - 값 개수가 자리표시자 개수와 다르면 [`FlowError::ParamCountMismatch`]
    /// - 자리표시자와 이미 확정된 값이 섞여 있으면 [`FlowError::MixedParams`]
    pub fn replace_empty_params<I, T>(&self, values: I) -> FlowResult<ConditionGroup>
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        let values: Vec<Operand> = values.into_iter().map(Into::into).collect();
        let expected = self.empty_param_count();
        if expected > 0 && self.resolved_value_count() > 0 {
            return Err(FlowError::MixedParams);
        }
        if values.len() != expected {
            return Err(FlowError::ParamCountMismatch {
                expected,
                actual: values.len(),
            });
        }

        let mut resolved = self.clone();
        let mut values = values.into_iter();
        resolved.for_each_operand_mut(&mut |op| {
            if op.is_param()
                && let Some(value) = values.next()
            {
                *op = value;
            }
        });
        Ok(resolved)
    }
}

impl Query for ConditionGroup {
    fn query(&self) -> String {
        self.cached.get_or_init(|| self.render_uncached()).clone()
    }
}

// ════════════════════════════════════════════
// CombinedCondition
// ════════════════════════════════════════════

/// 왼쪽 결합 이진 트리. 각 노드는 `(left SEP right)`로 렌더링됩니다.
///
/// `begin(A).or(B).and(C)` → `((A OR B) AND C)`
#[derive(Debug, Clone)]
pub enum CombinedCondition {
    Leaf(Box<Predicate>),
    Node {
        left: Box<CombinedCondition>,
        separator: Separator,
        right: Box<Predicate>,
    },
}

impl CombinedCondition {
    pub fn begin(predicate: impl Into<Predicate>) -> Self {
        CombinedCondition::Leaf(Box::new(predicate.into()))
    }

    pub fn and(self, predicate: impl Into<Predicate>) -> Self {
        self.node(Separator::And, predicate.into())
    }

    pub fn or(self, predicate: impl Into<Predicate>) -> Self {
        self.node(Separator::Or, predicate.into())
    }

    fn node(self, separator: Separator, right: Predicate) -> Self {
        CombinedCondition::Node {
            left: Box::new(self),
            separator,
            right: Box::new(right),
        }
    }

    fn render(&self, out: &mut QueryBuilder) {
        match self {
            CombinedCondition::Leaf(p) => p.render(out),
            CombinedCondition::Node {
                left,
                separator,
                right,
            } => {
                out.append("(");
                left.render(out);
                out.append_space_separated(separator.as_sql());
                right.render(out);
                out.append(")");
            }
        }
    }

    fn for_each_operand(&self, f: &mut dyn FnMut(&Operand)) {
        match self {
            CombinedCondition::Leaf(p) => p.for_each_operand(f),
            CombinedCondition::Node { left, right, .. } => {
                left.for_each_operand(f);
                right.for_each_operand(f);
            }
        }
    }

    fn for_each_operand_mut(&mut self, f: &mut dyn FnMut(&mut Operand)) {
        match self {
            CombinedCondition::Leaf(p) => p.for_each_operand_mut(f),
            CombinedCondition::Node { left, right, .. } => {
                left.for_each_operand_mut(f);
                right.for_each_operand_mut(f);
            }
        }
    }
}

impl Query for CombinedCondition {
    fn query(&self) -> String {
        let mut out = QueryBuilder::new();
        self.render(&mut out);
        out.into_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_conditions() {
        assert_eq!(Condition::column("number").is(5i64).query(), "`number`=5");
        assert_eq!(Condition::column("name").is_not("x").query(), "`name`!='x'");
        assert_eq!(Condition::column("age").greater_than(18).query(), "`age`>18");
        assert_eq!(Condition::column("age").less_than_or_eq(65).query(), "`age`<=65");
        assert_eq!(Condition::column("name").like("J%").query(), "`name` LIKE 'J%'");
        assert_eq!(Condition::column("name").glob("J*").query(), "`name` GLOB 'J*'");
        assert_eq!(Condition::column("col").is_null().query(), "`col` IS NULL");
        assert_eq!(Condition::column("col").is_not_null().query(), "`col` IS NOT NULL");
    }

    #[test]
    fn test_converted_operands() {
        use std::time::{Duration, UNIX_EPOCH};
        let converters = TypeConverterRegistry::with_defaults();
        let at = UNIX_EPOCH + Duration::from_millis(1500);
        assert_eq!(
            Condition::column("created").greater_than_converted(&at, &converters).unwrap().query(),
            "`created`>1500"
        );
        assert_eq!(
            Condition::column("active").is_converted(&true, &converters).unwrap().query(),
            "`active`=1"
        );
        let flags = [true, false];
        let cond = Condition::column("active").is_in_converted(&flags, &converters).unwrap();
        assert_eq!(Predicate::from(cond).query(), "`active` IN (1,0)");

        // 변환기 없는 타입은 오류
        let empty = TypeConverterRegistry::empty();
        let err = Condition::column("active").is_converted(&true, &empty).unwrap_err();
        assert!(matches!(err, FlowError::Configuration { .. }));
    }

    #[test]
    fn test_and_group() {
        let group = ConditionGroup::new()
            .and(Condition::column("number").is(5i64))
            .and(Condition::column("bytes").is(5u8));
        assert_eq!(group.query(), "`number`=5 AND `bytes`=5");
    }

    #[test]
    fn test_or_group() {
        let group = ConditionGroup::new()
            .and(Condition::column("a").is(1))
            .or(Condition::column("b").is(2))
            .and(Condition::column("c").is(3));
        assert_eq!(group.query(), "`a`=1 OR `b`=2 AND `c`=3");
    }

    #[test]
    fn test_explicit_separator_on_condition() {
        let group = ConditionGroup::new()
            .and(Condition::column("a").is(1).separator(Separator::Or))
            .and(Condition::column("b").is(2));
        assert_eq!(group.query(), "`a`=1 OR `b`=2");
    }

    #[test]
    fn test_in_condition() {
        let cond = Condition::column("name").is_in(["Jason", "Ryan", "Michael"]);
        assert_eq!(Predicate::from(cond).query(), "`name` IN ('Jason','Ryan','Michael')");

        let cond = Condition::column("id").is_not_in([1, 2]).and(3);
        assert_eq!(Predicate::from(cond).query(), "`id` NOT IN (1,2,3)");
    }

    #[test]
    fn test_between() {
        let cond = Condition::column("age").between(18).and(65);
        assert_eq!(Predicate::from(cond).query(), "`age` BETWEEN 18 AND 65");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            Condition::column("name").is("O'Brien").query(),
            "`name`='O''Brien'"
        );
    }

    #[test]
    fn test_collate_and_post_argument() {
        let cond = Condition::column("name")
            .is("abc")
            .collate(Collate::NoCase)
            .post_argument("ESCAPE '\\'");
        assert_eq!(cond.query(), "`name`='abc' COLLATE NOCASE ESCAPE '\\'");
    }

    #[test]
    fn test_concatenate() {
        let cond = Condition::column("name").concatenate("-suffix");
        assert_eq!(cond.query(), "`name`=`name` || '-suffix'");
    }

    #[test]
    fn test_column_operand() {
        let cond = Condition::column("a.id").is(Operand::column("b.a_id"));
        assert_eq!(cond.query(), "`a`.`id`=`b`.`a_id`");
    }

    #[test]
    fn test_nested_group_parenthesized() {
        let inner = ConditionGroup::new()
            .and(Condition::column("a").is(1))
            .or(Condition::column("b").is(2));
        let group = ConditionGroup::new()
            .and(inner)
            .and(Condition::column("c").is(3));
        assert_eq!(group.query(), "(`a`=1 OR `b`=2) AND `c`=3");
    }

    #[test]
    fn test_combined_condition() {
        let combined = CombinedCondition::begin(Condition::column("a").is(1))
            .or(Condition::column("b").is(2))
            .and(Condition::column("c").is(3));
        assert_eq!(combined.query(), "((`a`=1 OR `b`=2) AND `c`=3)");
    }

    #[test]
    fn test_exists() {
        let sub = QueryBuilder::with("SELECT 1 FROM `t`");
        let p: Predicate = ExistenceCondition::exists(&sub).into();
        assert_eq!(p.query(), "EXISTS (SELECT 1 FROM `t`)");
        let p: Predicate = ExistenceCondition::not_exists(&sub).into();
        assert_eq!(p.query(), "NOT EXISTS (SELECT 1 FROM `t`)");
    }

    #[test]
    fn test_empty_params_replaced() {
        let group = ConditionGroup::new()
            .and(Condition::column("number").is(Operand::param()))
            .and(Condition::column("name").is(Operand::param()));
        assert_eq!(group.query(), "`number`=? AND `name`=?");
        assert_eq!(group.empty_param_count(), 2);

        let resolved = group
            .replace_empty_params([Operand::from(5), Operand::from("x")])
            .unwrap();
        assert_eq!(resolved.query(), "`number`=5 AND `name`='x'");
        // 원본은 그대로
        assert_eq!(group.query(), "`number`=? AND `name`=?");
    }

    #[test]
    fn test_empty_params_count_mismatch() {
        let group = ConditionGroup::new().and(Condition::column("a").is(Operand::param()));
        let err = group.replace_empty_params([1, 2]).unwrap_err();
        assert!(matches!(
            err,
            FlowError::ParamCountMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_empty_params_mixed() {
        let group = ConditionGroup::new()
            .and(Condition::column("a").is(Operand::param()))
            .and(Condition::column("b").is(2));
        assert!(matches!(
            group.replace_empty_params([1]),
            Err(FlowError::MixedParams)
        ));
    }

    #[test]
    fn test_question_mark_string_is_not_a_param() {
        let group = ConditionGroup::new().and(Condition::column("a").is("?"));
        assert_eq!(group.empty_param_count(), 0);
        assert_eq!(group.query(), "`a`='?'");
    }

    #[test]
    fn test_empty_params_in_nested_group_and_in_list() {
        let group = ConditionGroup::new()
            .and(ConditionGroup::new().and(Condition::column("a").is(Operand::param())))
            .and(Condition::column("b").is_in([Operand::param(), Operand::param()]));
        let resolved = group.replace_empty_params([1, 2, 3]).unwrap();
        assert_eq!(resolved.query(), "(`a`=1) AND `b` IN (2,3)");
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let mut group = ConditionGroup::new().and(Condition::column("a").is(1));
        assert_eq!(group.query(), "`a`=1");
        group.push(Condition::column("b").is(2).into(), Separator::And);
        assert_eq!(group.query(), "`a`=1 AND `b`=2");
    }

    #[test]
    fn test_comma_group() {
        let group = ConditionGroup::comma_separated()
            .and(Condition::column("a").is(1))
            .and(Condition::column("b").is("x"));
        assert_eq!(group.query(), "`a`=1,`b`='x'");
    }
}
