// ==========================================
// 表格行导入管道 - 文件读取器
// ==========================================
// 支持: CSV (.csv) / Excel (.xlsx/.xlsm/.xls/.xlsb) / ODS (.ods)
// 约定: 第一行为表头；逐行惰性产出 SheetRow；读取失败以 Err 产出
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::header::normalize_header;
use crate::importer::sheet_row::SheetRow;
use crate::importer::value::Value;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 工作表选择（从 0 开始的序号或名称）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// 读取选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// CSV 分隔符（须为 ASCII 字符）
    pub delimiter: char,
    /// 工作表（仅 Excel/ODS）
    pub sheet: SheetSelector,
    /// 表头是否标准化为标识符
    pub normalize_headers: bool,
    /// 是否跳过完全空白的行
    pub skip_blank_rows: bool,
    /// CSV 单元格是否去除首尾空白
    pub trim: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            sheet: SheetSelector::default(),
            normalize_headers: true,
            skip_blank_rows: true,
            trim: false,
        }
    }
}

impl ReaderOptions {
    fn delimiter_byte(&self) -> ImportResult<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ImportError::configuration(format!(
                "CSV 分隔符必须为 ASCII 字符: {:?}",
                self.delimiter
            )))
        }
    }

    fn header_names<I, S>(&self, raw: I) -> Arc<[String]>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(|h| {
                if self.normalize_headers {
                    normalize_header(h.as_ref())
                } else {
                    h.as_ref().trim().to_string()
                }
            })
            .collect()
    }
}

fn check_file(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV 读取器
// ==========================================
pub struct CsvRowReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Arc<[String]>,
    skip_blank_rows: bool,
    record: StringRecord,
}

impl CsvRowReader<File> {
    /// 打开 CSV 文件
    pub fn open<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> ImportResult<Self> {
        let path = path.as_ref();
        check_file(path)?;

        let ext = extension_of(path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(path)?;
        let reader = Self::from_reader(file, options)?;
        info!(path = %path.display(), columns = reader.headers.len(), "CSV 文件已打开");
        Ok(reader)
    }
}

impl<R: Read> CsvRowReader<R> {
    /// 从任意输入流创建读取器（首行为表头）
    pub fn from_reader(input: R, options: &ReaderOptions) -> ImportResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .delimiter(options.delimiter_byte()?)
            .trim(if options.trim { Trim::Fields } else { Trim::None })
            .from_reader(input);

        let headers = options.header_names(reader.headers()?.iter());
        debug!(headers = ?headers, "CSV 表头");

        Ok(Self {
            reader,
            headers,
            skip_blank_rows: options.skip_blank_rows,
            record: StringRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for CsvRowReader<R> {
    type Item = ImportResult<SheetRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) => {
                    if self.skip_blank_rows && self.record.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }
                    let cells = self
                        .record
                        .iter()
                        .map(|field| Value::Text(field.to_string()))
                        .collect();
                    return Some(Ok(SheetRow::new(self.headers.clone(), cells)));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ==========================================
// Excel 读取器
// ==========================================
pub struct ExcelRowReader {
    sheet_name: String,
    headers: Arc<[String]>,
    range: Range<Data>,
    next_row: usize,
    skip_blank_rows: bool,
}

impl ExcelRowReader {
    /// 打开工作簿并选择工作表（默认第 0 个）
    pub fn open<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> ImportResult<Self> {
        let path = path.as_ref();
        check_file(path)?;

        let ext = extension_of(path);
        if !matches!(ext.as_str(), "xlsx" | "xlsm" | "xls" | "xlsb" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names();
        let sheet_name = match &options.sheet {
            SheetSelector::Index(index) => sheet_names.get(*index).cloned().ok_or_else(|| {
                ImportError::WorksheetNotFound(format!("序号 {}（共 {} 个）", index, sheet_names.len()))
            })?,
            SheetSelector::Name(name) => sheet_names
                .iter()
                .find(|s| *s == name)
                .cloned()
                .ok_or_else(|| ImportError::WorksheetNotFound(name.clone()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;
        let reader = Self::from_range(sheet_name, range, options);
        info!(
            path = %path.display(),
            sheet = %reader.sheet_name,
            rows = reader.len(),
            "Excel 工作表已打开"
        );
        Ok(reader)
    }

    /// 从已读取的单元格区域创建读取器（首行为表头）
    pub fn from_range(sheet_name: impl Into<String>, range: Range<Data>, options: &ReaderOptions) -> Self {
        let width = range.width();
        let raw_headers: Vec<String> = if range.height() == 0 {
            Vec::new()
        } else {
            (0..width)
                .map(|col| range.get((0, col)).map(header_text).unwrap_or_default())
                .collect()
        };

        Self {
            sheet_name: sheet_name.into(),
            headers: options.header_names(raw_headers),
            range,
            next_row: 1,
            skip_blank_rows: options.skip_blank_rows,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 数据行数（不含表头）
    pub fn len(&self) -> usize {
        self.range.height().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for ExcelRowReader {
    type Item = ImportResult<SheetRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_row < self.range.height() {
            let row = self.next_row;
            self.next_row += 1;

            let cells: Vec<Value> = (0..self.range.width())
                .map(|col| self.range.get((row, col)).map(cell_value).unwrap_or_default())
                .collect();
            let sheet_row = SheetRow::new(self.headers.clone(), cells);

            if self.skip_blank_rows && sheet_row.is_blank() {
                continue;
            }
            return Some(Ok(sheet_row));
        }
        None
    }
}

/// Excel 序列号中 1900-02-29 之前（含）的值不按日期解释
const EXCEL_LEAP_BUG_SERIAL: f64 = 60.0;

/// 单元格值提取（区分日期/布尔/数值/文本/错误）
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if dt.is_duration() || serial <= EXCEL_LEAP_BUG_SERIAL {
                Value::Float(serial)
            } else {
                // as_datetime 按工作簿的日期系统（1900/1904）换算
                dt.as_datetime()
                    .map(Value::DateTime)
                    .unwrap_or(Value::Float(serial))
            }
        }
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .map(Value::DateTime)
            .unwrap_or_else(|_| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.0}", f),
        other => other.to_string(),
    }
}

// ==========================================
// 通用读取器（根据扩展名自动选择）
// ==========================================
pub enum RowReader {
    Csv(CsvRowReader<File>),
    Excel(ExcelRowReader),
}

impl RowReader {
    pub fn headers(&self) -> &[String] {
        match self {
            RowReader::Csv(reader) => reader.headers(),
            RowReader::Excel(reader) => reader.headers(),
        }
    }
}

impl Iterator for RowReader {
    type Item = ImportResult<SheetRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RowReader::Csv(reader) => reader.next(),
            RowReader::Excel(reader) => reader.next(),
        }
    }
}

/// 按扩展名打开数据源
pub fn open_rows<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> ImportResult<RowReader> {
    let path = path.as_ref();
    match extension_of(path).as_str() {
        "csv" => Ok(RowReader::Csv(CsvRowReader::open(path, options)?)),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => {
            Ok(RowReader::Excel(ExcelRowReader::open(path, options)?))
        }
        other => Err(ImportError::UnsupportedFormat(other.to_string())),
    }
}
