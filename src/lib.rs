// ==========================================
// 表格行导入管道 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 定位: 逐行读取表格数据，按字段定义解析/转换/清洗后交给落库回调
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 导入层 - 字段解析与运行编排
pub mod importer;

// 配置层 - 导入配置文件
pub mod config;

// 数据仓储层 - 导入结果持久化
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::ImportConfig;
pub use importer::{
    ContinueOnError, ErrorAction, FieldSet, FieldSpec, ImportError, ImportHandler, ImportResult,
    Importer, RowAccess, RowValues, RunPhase, RunSummary, Value,
};
pub use repository::{SqliteRowRepository, SqliteSink};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格行导入管道";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
