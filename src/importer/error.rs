// ==========================================
// 表格行导入管道 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 配置错误（致命） / 行级错误（交由错误策略） / 数据源错误（致命）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误 =====
    #[error("字段配置错误: {message}")]
    Configuration { message: String },

    // ===== 行级错误 =====
    #[error("必填字段缺失 (行 {row}, 字段 {field}): 候选列名 [{}] 均不存在", .candidates.join(", "))]
    RequiredFieldMissing {
        row: usize,
        field: String,
        candidates: Vec<String>,
    },

    #[error("类型转换失败: 无法将 {value} 转换为 {expected}")]
    TypeConversion {
        expected: &'static str,
        value: String,
    },

    #[error("数据清洗失败 (字段 {field}): {message}")]
    Clean { field: String, message: String },

    #[error("落库失败 (行 {row}): {message}")]
    Save { row: usize, message: String },

    // ===== 数据源错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.xlsx/.xlsm/.xls/.xlsb/.ods）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("工作表不存在: {0}")]
    WorksheetNotFound(String),

    // ===== 仓储错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 构造配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        ImportError::Configuration {
            message: message.into(),
        }
    }

    /// 是否为配置错误（运行前即失败，不读取任何行）
    pub fn is_configuration(&self) -> bool {
        matches!(self, ImportError::Configuration { .. })
    }

    /// 是否为行级错误（交由 on_error 决定是否继续）
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ImportError::RequiredFieldMissing { .. }
                | ImportError::TypeConversion { .. }
                | ImportError::Clean { .. }
                | ImportError::Save { .. }
        )
    }

    /// 是否为数据源错误（读取下一行时失败）
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::CsvParseError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::WorksheetNotFound(_)
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::configuration(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
