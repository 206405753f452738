// ==========================================
// 表格行导入管道 - 数据仓储层
// ==========================================
// 职责: 导入结果持久化（SQLite），屏蔽数据库细节
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_row_repo;
pub mod import_sink;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_row_repo::{
    ImportRowErrorEntity, ImportRunEntity, ImportedRowEntity, RunCounters, SqliteRowRepository,
};
pub use import_sink::SqliteSink;
