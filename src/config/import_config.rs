// ==========================================
// 表格行导入管道 - 导入配置文件
// ==========================================
// 格式: JSON
// 内容: 数据源 / 字段列表 / 错误策略 / 数据库路径
// ==========================================

use crate::importer::coercion::CoercionKind;
use crate::importer::data_cleaner::CleanKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::{FieldSet, FieldSpec};
use crate::importer::file_parser::ReaderOptions;
use crate::importer::import_handler_trait::ErrorAction;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "TABULAR_IMPORT_DB_PATH";

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "imports.db";

/// 数据目录下的应用子目录
pub const APP_DIR_NAME: &str = "tabular-import";

// ==========================================
// ImportConfig
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub source: SourceConfig,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default)]
    pub database: Option<String>,
}

/// 数据源配置（读取选项与 path 平铺在同一层）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: ReaderOptions,
}

/// 单个字段配置
///
/// # 示例
/// ```json
/// { "names": ["id", "code"], "required": true, "coerce": "int", "clean": "trim" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub names: NameList,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub coerce: Option<CoercionKind>,
    #[serde(default)]
    pub clean: Option<CleanKind>,
}

/// 单个列名或候选列名列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl NameList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            NameList::One(name) => vec![name],
            NameList::Many(names) => names,
        }
    }
}

/// 行级错误后的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    #[default]
    Stop,
    Continue,
}

impl From<OnError> for ErrorAction {
    fn from(on_error: OnError) -> Self {
        match on_error {
            OnError::Stop => ErrorAction::Stop,
            OnError::Continue => ErrorAction::Continue,
        }
    }
}

impl FieldConfig {
    pub fn to_field_spec(&self) -> FieldSpec {
        let mut spec = FieldSpec::new(self.names.clone().into_vec()).with_required(self.required);
        if let Some(kind) = self.coerce {
            spec = spec.coerce_with(kind.coercion());
        }
        if let Some(kind) = self.clean {
            spec = spec.clean_with(kind.cleaner());
        }
        spec
    }
}

impl ImportConfig {
    /// 读取并校验配置文件
    ///
    /// # 说明
    /// - 相对的 source.path 以配置文件所在目录为基准
    /// - JSON 格式错误、字段列表为空或字段定义非法均为配置错误
    pub fn load<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImportError::configuration(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&content)?;
        if config.source.path.is_relative() {
            if let Some(base) = path.parent() {
                config.source.path = base.join(&config.source.path);
            }
        }
        debug!(config = %path.display(), source = %config.source.path.display(), "配置文件已加载");
        Ok(config)
    }

    /// 从 JSON 文本解析并校验
    pub fn from_json(content: &str) -> ImportResult<Self> {
        let config: ImportConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ImportResult<()> {
        if self.fields.is_empty() {
            return Err(ImportError::configuration("fields 不能为空"));
        }
        self.field_set().validate()?;
        Ok(())
    }

    pub fn field_set(&self) -> FieldSet {
        self.fields.iter().map(FieldConfig::to_field_spec).collect::<Vec<_>>().into()
    }

    pub fn error_action(&self) -> ErrorAction {
        self.on_error.into()
    }

    /// 数据库路径: 命令行参数 > 配置文件 > 默认路径
    pub fn database_path(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| self.database.clone())
            .unwrap_or_else(default_db_path)
    }
}

/// 默认数据库路径
///
/// # 优先级
/// 1. 环境变量 TABULAR_IMPORT_DB_PATH
/// 2. 用户数据目录/tabular-import/imports.db
/// 3. ./imports.db
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(DEFAULT_DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
        .to_string_lossy()
        .into_owned()
}
