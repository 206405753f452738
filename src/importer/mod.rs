// ==========================================
// 表格行导入管道 - 导入层
// ==========================================
// 职责: 行数据 → 字段解析 → 类型转换 → 清洗 → 落库回调
// 支持: CSV, Excel/ODS, 任意实现 RowAccess 的行
// ==========================================

// 模块声明
pub mod coercion;
pub mod data_cleaner;
pub mod error;
pub mod field_spec;
pub mod file_parser;
pub mod header;
pub mod import_handler_trait;
pub mod orchestrator;
pub mod row_access;
pub mod row_processor;
pub mod row_values;
pub mod sheet_row;
pub mod value;

// 重导出核心类型
pub use coercion::CoercionKind;
pub use data_cleaner::CleanKind;
pub use error::{ImportError, ImportResult};
pub use field_spec::{Cleaner, Coercion, FieldSet, FieldSetBuilder, FieldSpec, ValidatedField, ValueGetter};
pub use file_parser::{open_rows, CsvRowReader, ExcelRowReader, ReaderOptions, RowReader, SheetSelector};
pub use header::{normalize_header, normalize_headers};
pub use orchestrator::{Importer, RunPhase, RunState, RunSummary};
pub use row_access::{resolve, ObjectRow, RowAccess};
pub use row_processor::RowProcessor;
pub use row_values::RowValues;
pub use sheet_row::SheetRow;
pub use value::Value;

// 重导出 Trait 接口
pub use import_handler_trait::{ContinueOnError, ErrorAction, FnHandler, ImportHandler};
