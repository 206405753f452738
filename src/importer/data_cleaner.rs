// ==========================================
// 表格行导入管道 - 内置字段清洗
// ==========================================
// 职责: TRIM / UPPER / NULL 标准化 / 标志位统一
// 签名: 与 Cleaner 一致 (行号, 本行已清洗字段, 值) -> 清洗后值
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::field_spec::{identity_cleaner, Cleaner};
use crate::importer::row_values::RowValues;
use crate::importer::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 配置文件中的清洗类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanKind {
    Identity,
    Trim,
    Upper,
    BlankAsNull,
    Flag,
}

impl CleanKind {
    pub fn cleaner(self) -> Cleaner {
        match self {
            CleanKind::Identity => identity_cleaner(),
            CleanKind::Trim => Arc::new(trim),
            CleanKind::Upper => Arc::new(upper),
            CleanKind::BlankAsNull => Arc::new(blank_as_null),
            CleanKind::Flag => Arc::new(flag),
        }
    }
}

/// 去除首尾空白（非文本原样返回）
pub fn trim(_row_index: usize, _values: &RowValues, value: Value) -> ImportResult<Value> {
    Ok(match value {
        Value::Text(s) => Value::Text(s.trim().to_string()),
        other => other,
    })
}

/// TRIM + 转大写
pub fn upper(_row_index: usize, _values: &RowValues, value: Value) -> ImportResult<Value> {
    Ok(match value {
        Value::Text(s) => Value::Text(s.trim().to_uppercase()),
        other => other,
    })
}

/// 空文本/空白 → Null
pub fn blank_as_null(_row_index: usize, _values: &RowValues, value: Value) -> ImportResult<Value> {
    Ok(if value.is_blank() { Value::Null } else { value })
}

/// 标志位统一为 "1" / "0"（Null 保持 Null）
pub fn flag(_row_index: usize, _values: &RowValues, value: Value) -> ImportResult<Value> {
    let on = match &value {
        Value::Null => return Ok(Value::Null),
        Value::Bool(b) => *b,
        Value::Int(i) => *i == 1,
        Value::Float(f) => *f == 1.0,
        Value::Text(s) => matches!(
            s.trim().to_uppercase().as_str(),
            "1" | "Y" | "YES" | "TRUE" | "是"
        ),
        Value::DateTime(_) => false,
    };
    Ok(Value::from(if on { "1" } else { "0" }))
}
