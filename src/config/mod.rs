// ==========================================
// 表格行导入管道 - 配置层
// ==========================================
// 职责: 导入配置文件加载、校验，转换为字段集合
// 存储: JSON 文件
// ==========================================

pub mod import_config;

// 重导出核心配置
pub use import_config::{
    default_db_path, FieldConfig, ImportConfig, NameList, OnError, SourceConfig, DB_PATH_ENV,
};
