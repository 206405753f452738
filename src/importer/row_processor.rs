// ==========================================
// 表格行导入管道 - 行处理器
// ==========================================
// 流程: 按字段声明顺序 取值 → 必填校验 → 类型转换 → 字段清洗 → 写入结果
//       全部字段完成后执行整行清洗
// 说明: 不做任何错误恢复，错误返回给导入器（清洗的通用错误归为 Clean）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::ValidatedField;
use crate::importer::import_handler_trait::ImportHandler;
use crate::importer::row_access::{resolve, RowAccess};
use crate::importer::row_values::RowValues;
use tracing::trace;

pub struct RowProcessor<'a> {
    fields: &'a [ValidatedField],
}

impl<'a> RowProcessor<'a> {
    pub fn new(fields: &'a [ValidatedField]) -> Self {
        Self { fields }
    }

    /// 解析并清洗一行的全部字段（不含整行清洗）
    pub fn resolve_fields<R: RowAccess>(&self, row_index: usize, row: &R) -> ImportResult<RowValues> {
        let mut values = RowValues::with_capacity(self.fields.len());
        let row_dyn: &dyn RowAccess = row;

        for field in self.fields {
            let raw = match &field.get_value {
                Some(getter) => getter(row_index, row_dyn, field.names.as_slice())?,
                None => {
                    let (raw, found) = resolve(row, &field.names);
                    if !found && field.required {
                        return Err(ImportError::RequiredFieldMissing {
                            row: row_index,
                            field: field.canonical.clone(),
                            candidates: field.names.clone(),
                        });
                    }
                    raw
                }
            };

            let coerced = (field.coerce)(raw)?;
            // 清洗函数抛出的通用错误补上字段名
            let cleaned = (field.clean)(row_index, &values, coerced).map_err(|e| match e {
                ImportError::Other(err) => ImportError::Clean {
                    field: field.canonical.clone(),
                    message: format!("{:#}", err),
                },
                other => other,
            })?;
            trace!(row_index, field = %field.canonical, value = %cleaned, "字段解析完成");
            values.insert(field.canonical.clone(), cleaned);
        }

        Ok(values)
    }

    /// 处理一行: 字段解析 + 整行清洗
    pub fn process<R, H>(&self, row_index: usize, row: &R, handler: &mut H) -> ImportResult<RowValues>
    where
        R: RowAccess,
        H: ImportHandler + ?Sized,
    {
        let values = self.resolve_fields(row_index, row)?;
        handler.clean_record(row_index, values)
    }
}
