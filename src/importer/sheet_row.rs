// ==========================================
// 表格行导入管道 - 表格行
// ==========================================
// 职责: CSV/Excel 读取器产出的行（共享表头 + 单元格值）
// 访问: 先按表头名，再按列号（十进制下标）
// ==========================================

use crate::importer::row_access::RowAccess;
use crate::importer::value::Value;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;

static NULL_VALUE: Value = Value::Null;

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    headers: Arc<[String]>,
    cells: Vec<Value>,
}

impl SheetRow {
    pub fn new(headers: Arc<[String]>, cells: Vec<Value>) -> Self {
        Self { headers, cells }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }

    /// 按表头取值；表头存在但本行较短时返回 Null
    pub fn get(&self, header: &str) -> Option<&Value> {
        let col = self.headers.iter().position(|h| h == header)?;
        Some(self.cells.get(col).unwrap_or(&NULL_VALUE))
    }

    /// 全部单元格为空或空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Value::is_blank)
    }
}

impl RowAccess for SheetRow {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.get(name) {
            return Some(value.clone());
        }
        let col: usize = name.trim().parse().ok()?;
        self.cells.get(col).cloned()
    }
}

// 序列化为 {表头: 值}，超出表头的单元格丢弃
impl Serialize for SheetRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (col, header) in self.headers.iter().enumerate() {
            map.serialize_entry(header, self.cells.get(col).unwrap_or(&NULL_VALUE))?;
        }
        map.end()
    }
}
