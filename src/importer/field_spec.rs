// ==========================================
// 表格行导入管道 - 字段规格
// ==========================================
// 职责: 声明式描述一个输出字段（名称/别名、取值函数、必填、转换、清洗）
// 校验: 每次运行前校验一次，生成不可变的 ValidatedField 列表
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_access::RowAccess;
use crate::importer::row_values::RowValues;
use crate::importer::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 自定义取值函数: (行号, 行, 候选名) -> 原始值
pub type ValueGetter =
    Arc<dyn Fn(usize, &dyn RowAccess, &[String]) -> ImportResult<Value> + Send + Sync>;

/// 类型转换函数: 原始值 -> 转换后值
pub type Coercion = Arc<dyn Fn(Value) -> ImportResult<Value> + Send + Sync>;

/// 字段清洗函数: (行号, 本行已清洗字段, 转换后值) -> 清洗后值
pub type Cleaner = Arc<dyn Fn(usize, &RowValues, Value) -> ImportResult<Value> + Send + Sync>;

pub(crate) fn identity_coercion() -> Coercion {
    Arc::new(|value: Value| -> ImportResult<Value> { Ok(value) })
}

pub(crate) fn identity_cleaner() -> Cleaner {
    Arc::new(|_: usize, _: &RowValues, value: Value| -> ImportResult<Value> { Ok(value) })
}

// ==========================================
// IntoNames - 名称列表归一化
// ==========================================
// 单个名称与名称列表统一为有序 Vec<String>
pub trait IntoNames {
    fn into_names(self) -> Vec<String>;
}

impl IntoNames for &str {
    fn into_names(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoNames for String {
    fn into_names(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoNames for Vec<String> {
    fn into_names(self) -> Vec<String> {
        self
    }
}

impl IntoNames for Vec<&str> {
    fn into_names(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoNames for &[&str] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoNames for [&str; N] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

// ==========================================
// FieldSpec - 字段规格
// ==========================================
#[derive(Clone, Default)]
pub struct FieldSpec {
    names: Vec<String>,
    get_value: Option<ValueGetter>,
    required: bool,
    coerce: Option<Coercion>,
    clean: Option<Cleaner>,
}

impl FieldSpec {
    /// 创建字段规格，第一个名称为标准字段名，其余为别名
    pub fn new(names: impl IntoNames) -> Self {
        Self {
            names: names.into_names(),
            ..Self::default()
        }
    }

    /// 创建仅由取值函数计算的字段
    pub fn computed<F>(names: impl IntoNames, getter: F) -> Self
    where
        F: Fn(usize, &dyn RowAccess, &[String]) -> ImportResult<Value> + Send + Sync + 'static,
    {
        Self::new(names).get_value(getter)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// 设置自定义取值函数（设置后忽略名称解析）
    pub fn get_value<F>(mut self, getter: F) -> Self
    where
        F: Fn(usize, &dyn RowAccess, &[String]) -> ImportResult<Value> + Send + Sync + 'static,
    {
        self.get_value = Some(Arc::new(getter));
        self
    }

    pub fn coerce<F>(mut self, coercion: F) -> Self
    where
        F: Fn(Value) -> ImportResult<Value> + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(coercion));
        self
    }

    pub fn coerce_with(mut self, coercion: Coercion) -> Self {
        self.coerce = Some(coercion);
        self
    }

    pub fn clean<F>(mut self, cleaner: F) -> Self
    where
        F: Fn(usize, &RowValues, Value) -> ImportResult<Value> + Send + Sync + 'static,
    {
        self.clean = Some(Arc::new(cleaner));
        self
    }

    pub fn clean_with(mut self, cleaner: Cleaner) -> Self {
        self.clean = Some(cleaner);
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn canonical_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("names", &self.names)
            .field("get_value", &self.get_value.is_some())
            .field("required", &self.required)
            .field("coerce", &self.coerce.is_some())
            .field("clean", &self.clean.is_some())
            .finish()
    }
}

// ==========================================
// ValidatedField - 校验后的字段
// ==========================================
// 转换/清洗函数已绑定，运行期间只读
#[derive(Clone)]
pub struct ValidatedField {
    pub canonical: String,
    pub names: Vec<String>,
    pub get_value: Option<ValueGetter>,
    pub required: bool,
    pub coerce: Coercion,
    pub clean: Cleaner,
}

impl fmt::Debug for ValidatedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedField")
            .field("canonical", &self.canonical)
            .field("names", &self.names)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

// ==========================================
// FieldSet - 导入器字段配置（不可变）
// ==========================================
// 有序字段规格 + 按标准字段名登记的清洗函数
#[derive(Clone)]
pub struct FieldSet {
    fields: Arc<[FieldSpec]>,
    cleaners: Arc<HashMap<String, Cleaner>>,
}

impl FieldSet {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields: fields.into(),
            cleaners: Arc::new(HashMap::new()),
        }
    }

    pub fn builder() -> FieldSetBuilder {
        FieldSetBuilder::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 校验全部字段规格并绑定转换/清洗函数
    ///
    /// # 规则
    /// - 名称列表为空且无取值函数 → 配置错误
    /// - 名称为空白 → 配置错误
    /// - 标准字段名重复 → 配置错误
    /// - 无名称的计算字段以 `field_{序号}` 作为标准字段名
    /// - 清洗函数: 显式设置 > 按标准字段名登记 > 原样返回
    pub fn validate(&self) -> ImportResult<Vec<ValidatedField>> {
        let mut validated = Vec::with_capacity(self.fields.len());
        let mut seen = HashSet::new();

        for (position, spec) in self.fields.iter().enumerate() {
            if let Some(blank) = spec.names.iter().position(|n| n.trim().is_empty()) {
                return Err(ImportError::configuration(format!(
                    "第 {} 个字段的第 {} 个名称为空",
                    position, blank
                )));
            }

            let canonical = match spec.names.first() {
                Some(name) => name.clone(),
                None if spec.get_value.is_some() => format!("field_{}", position),
                None => {
                    return Err(ImportError::configuration(format!(
                        "第 {} 个字段既没有名称也没有取值函数",
                        position
                    )))
                }
            };

            if !seen.insert(canonical.clone()) {
                return Err(ImportError::configuration(format!(
                    "字段 '{}' 重复声明",
                    canonical
                )));
            }

            let clean = spec
                .clean
                .clone()
                .or_else(|| self.cleaners.get(&canonical).cloned())
                .unwrap_or_else(identity_cleaner);

            validated.push(ValidatedField {
                canonical,
                names: spec.names.clone(),
                get_value: spec.get_value.clone(),
                required: spec.required,
                coerce: spec.coerce.clone().unwrap_or_else(identity_coercion),
                clean,
            });
        }

        for name in self.cleaners.keys() {
            if !seen.contains(name) {
                warn!(field = %name, "清洗函数未匹配任何字段，已忽略");
            }
        }

        Ok(validated)
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cleaners: Vec<_> = self.cleaners.keys().collect();
        cleaners.sort();
        f.debug_struct("FieldSet")
            .field("fields", &self.fields)
            .field("cleaners", &cleaners)
            .finish()
    }
}

impl From<Vec<FieldSpec>> for FieldSet {
    fn from(fields: Vec<FieldSpec>) -> Self {
        FieldSet::new(fields)
    }
}

#[derive(Default)]
pub struct FieldSetBuilder {
    fields: Vec<FieldSpec>,
    cleaners: HashMap<String, Cleaner>,
}

impl FieldSetBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(mut self, specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(specs);
        self
    }

    /// 按标准字段名登记清洗函数（字段未显式设置 clean 时生效）
    pub fn cleaner<F>(mut self, field: impl Into<String>, cleaner: F) -> Self
    where
        F: Fn(usize, &RowValues, Value) -> ImportResult<Value> + Send + Sync + 'static,
    {
        self.cleaners.insert(field.into(), Arc::new(cleaner));
        self
    }

    pub fn build(self) -> FieldSet {
        FieldSet {
            fields: self.fields.into(),
            cleaners: Arc::new(self.cleaners),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_name_normalized_to_list() {
        let spec = FieldSpec::new("id");
        assert_eq!(spec.names(), &["id".to_string()]);
        assert_eq!(spec.canonical_name(), Some("id"));
    }

    #[test]
    fn test_alias_list_keeps_order() {
        let spec = FieldSpec::new(["name", "full_name"]);
        assert_eq!(spec.names(), &["name".to_string(), "full_name".to_string()]);
    }

    #[test]
    fn test_validate_defaults_to_identity() {
        let fields = FieldSet::new(vec![FieldSpec::new("a")]);
        let validated = fields.validate().unwrap();

        let field = &validated[0];
        assert_eq!(field.canonical, "a");
        assert!(!field.required);
        assert_eq!((field.coerce)(Value::from("x")).unwrap(), Value::from("x"));
        assert_eq!(
            (field.clean)(0, &RowValues::new(), Value::Int(3)).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_validate_rejects_nameless_field_without_getter() {
        let fields = FieldSet::new(vec![FieldSpec::new(Vec::<String>::new())]);
        let err = fields.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_accepts_nameless_computed_field() {
        let fields = FieldSet::new(vec![
            FieldSpec::new("a"),
            FieldSpec::computed(Vec::<String>::new(), |_, _, _| Ok(Value::Int(1))),
        ]);
        let validated = fields.validate().unwrap();
        assert_eq!(validated[1].canonical, "field_1");
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let fields = FieldSet::new(vec![FieldSpec::new(["id", "  "])]);
        assert!(fields.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_validate_rejects_duplicate_canonical_name() {
        let fields = FieldSet::new(vec![FieldSpec::new("id"), FieldSpec::new(["id", "code"])]);
        assert!(fields.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_registered_cleaner_bound_by_canonical_name() {
        let fields = FieldSet::builder()
            .field(FieldSpec::new(["name", "full_name"]))
            .cleaner("name", |_, _, v| Ok(Value::from(v.to_string().to_uppercase())))
            .build();
        let validated = fields.validate().unwrap();
        let cleaned = (validated[0].clean)(0, &RowValues::new(), Value::from("ann")).unwrap();
        assert_eq!(cleaned, Value::from("ANN"));
    }

    #[test]
    fn test_explicit_cleaner_overrides_registered_one() {
        let fields = FieldSet::builder()
            .field(FieldSpec::new("name").clean(|_, _, _| Ok(Value::from("explicit"))))
            .cleaner("name", |_, _, _| Ok(Value::from("registered")))
            .build();
        let validated = fields.validate().unwrap();
        let cleaned = (validated[0].clean)(0, &RowValues::new(), Value::Null).unwrap();
        assert_eq!(cleaned, Value::from("explicit"));
    }
}
