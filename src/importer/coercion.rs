// ==========================================
// 表格行导入管道 - 内置类型转换
// ==========================================
// 职责: 原始值 → 目标类型（在字段清洗之前执行）
// 约定: Null 原样返回；文本先 TRIM，空文本视为 Null
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::{identity_coercion, Coercion};
use crate::importer::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 配置文件中的转换类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionKind {
    Identity,
    Int,
    Float,
    Text,
    Bool,
    Date,
    Datetime,
    ExcelText,
}

impl CoercionKind {
    pub fn coercion(self) -> Coercion {
        match self {
            CoercionKind::Identity => identity_coercion(),
            CoercionKind::Int => Arc::new(to_int),
            CoercionKind::Float => Arc::new(to_float),
            CoercionKind::Text => Arc::new(to_text),
            CoercionKind::Bool => Arc::new(to_bool),
            CoercionKind::Date => Arc::new(to_date),
            CoercionKind::Datetime => Arc::new(to_datetime),
            CoercionKind::ExcelText => Arc::new(excel_text),
        }
    }
}

fn conversion_error(expected: &'static str, value: &Value) -> ImportError {
    ImportError::TypeConversion {
        expected,
        value: format!("{:?}", value),
    }
}

/// 提取非空文本（TRIM 后）
fn non_blank_text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// 2^63，i64 可表示范围的上界（不含）
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// 无小数部分且在 i64 范围内的浮点数 → i64
fn whole_float_to_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then_some(f as i64)
}

/// 转换为整数
///
/// # 规则
/// - 无小数部分的浮点数（Excel 数值单元格）转换为整数
/// - 文本支持 "12" 与 "12.0"
/// - 超出 i64 范围的数值为转换错误
pub fn to_int(value: Value) -> ImportResult<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        Value::Int(_) => Ok(value),
        Value::Float(f) => whole_float_to_i64(*f)
            .map(Value::Int)
            .ok_or_else(|| conversion_error("int", &value)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Text(_) => match non_blank_text(&value) {
            None => Ok(Value::Null),
            Some(text) => text
                .parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole_float_to_i64))
                .map(Value::Int)
                .ok_or_else(|| conversion_error("int", &value)),
        },
        _ => Err(conversion_error("int", &value)),
    }
}

/// 转换为浮点数
pub fn to_float(value: Value) -> ImportResult<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        Value::Float(_) => Ok(value),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Text(_) => match non_blank_text(&value) {
            None => Ok(Value::Null),
            Some(text) => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| conversion_error("float", &value)),
        },
        _ => Err(conversion_error("float", &value)),
    }
}

/// 转换为文本
pub fn to_text(value: Value) -> ImportResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(_) => Ok(value),
        other => Ok(Value::Text(other.to_string())),
    }
}

/// 转换为布尔值（1/Y/YES/TRUE/是 为真，0/N/NO/FALSE/否 为假）
pub fn to_bool(value: Value) -> ImportResult<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        Value::Bool(_) => Ok(value),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Text(_) => match non_blank_text(&value) {
            None => Ok(Value::Null),
            Some(text) => match text.to_uppercase().as_str() {
                "1" | "Y" | "YES" | "TRUE" | "是" => Ok(Value::Bool(true)),
                "0" | "N" | "NO" | "FALSE" | "否" => Ok(Value::Bool(false)),
                _ => Err(conversion_error("bool", &value)),
            },
        },
        _ => Err(conversion_error("bool", &value)),
    }
}

/// 转换为日期（YYYYMMDD 或 YYYY-MM-DD，结果为当日 00:00:00）
pub fn to_date(value: Value) -> ImportResult<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        Value::DateTime(dt) => Ok(Value::DateTime(dt.date().and_time(NaiveTime::MIN))),
        Value::Text(_) => match non_blank_text(&value) {
            None => Ok(Value::Null),
            Some(text) => NaiveDate::parse_from_str(text, "%Y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
                .map(|d| Value::DateTime(d.and_time(NaiveTime::MIN)))
                .map_err(|_| conversion_error("date", &value)),
        },
        _ => Err(conversion_error("date", &value)),
    }
}

/// 转换为日期时间（YYYYMMDDHHMMSS / YYYY-MM-DD HH:MM:SS / ISO 8601）
pub fn to_datetime(value: Value) -> ImportResult<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        Value::DateTime(_) => Ok(value),
        Value::Text(_) => match non_blank_text(&value) {
            None => Ok(Value::Null),
            Some(text) => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .map(Value::DateTime)
                .map_err(|_| conversion_error("datetime", &value)),
        },
        _ => Err(conversion_error("datetime", &value)),
    }
}

/// 电子表格数值转文本
///
/// Excel 将整数存为浮点数，无小数部分时按整数输出（2.0 → "2"）
pub fn excel_text(value: Value) -> ImportResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
            // -0.0 输出为 "0"
            let f = if f == 0.0 { 0.0 } else { f };
            Ok(Value::Text(format!("{:.0}", f)))
        }
        other => to_text(other),
    }
}
