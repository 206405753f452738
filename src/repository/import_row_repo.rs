// ==========================================
// 表格行导入管道 - 导入行仓储
// ==========================================
// 职责: 导入运行记录 / 已保存行（JSON）/ 行级错误 的持久化
// 红线: Repository 不含业务逻辑，只做数据 CRUD
// ==========================================

use crate::db::{ensure_parent_dir, open_sqlite_connection, IN_MEMORY};
use crate::importer::orchestrator::RunState;
use crate::importer::row_values::RowValues;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

/// 导入运行记录
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRunEntity {
    pub run_id: String,
    pub source: String,
    pub rows_processed: i64,
    pub rows_saved: i64,
    pub exception_count: i64,
    pub aborted: bool,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

/// 已保存行
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRowEntity {
    pub row_index: usize,
    pub payload: serde_json::Value,
    pub imported_at: NaiveDateTime,
}

/// 行级错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRowErrorEntity {
    pub row_index: usize,
    pub message: String,
}

/// 运行结束时写回的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub rows_processed: usize,
    pub rows_saved: usize,
    pub exception_count: usize,
    pub aborted: bool,
}

impl From<&RunState> for RunCounters {
    fn from(state: &RunState) -> Self {
        Self {
            rows_processed: state.rows_processed,
            rows_saved: state.rows_saved,
            exception_count: state.exception_count,
            aborted: state.aborted,
        }
    }
}

// ==========================================
// SqliteRowRepository
// ==========================================
#[derive(Clone)]
pub struct SqliteRowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowRepository {
    /// 打开（或创建）数据库文件并建表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 为内存库）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        ensure_parent_dir(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 内存库（测试/试运行）
    pub fn in_memory() -> RepositoryResult<Self> {
        Self::new(IN_MEMORY)
    }

    /// 复用已有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_tables()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_run (
              run_id TEXT PRIMARY KEY,
              source TEXT NOT NULL,
              rows_processed INTEGER NOT NULL DEFAULT 0,
              rows_saved INTEGER NOT NULL DEFAULT 0,
              exception_count INTEGER NOT NULL DEFAULT 0,
              aborted INTEGER NOT NULL DEFAULT 0,
              started_at TEXT NOT NULL,
              finished_at TEXT
            );

            CREATE TABLE IF NOT EXISTS imported_row (
              run_id TEXT NOT NULL REFERENCES import_run(run_id) ON DELETE CASCADE,
              row_index INTEGER NOT NULL,
              payload TEXT NOT NULL,
              imported_at TEXT NOT NULL,
              PRIMARY KEY (run_id, row_index)
            );

            CREATE TABLE IF NOT EXISTS import_row_error (
              run_id TEXT NOT NULL REFERENCES import_run(run_id) ON DELETE CASCADE,
              row_index INTEGER NOT NULL,
              message TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_import_row_error_run
              ON import_row_error(run_id, row_index);
            "#,
        )?;
        Ok(())
    }

    // ===== 运行记录 =====

    pub fn begin_run(&self, run_id: &str, source: &str, started_at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO import_run (run_id, source, started_at) VALUES (?1, ?2, ?3)",
            params![run_id, source, started_at],
        )?;
        Ok(())
    }

    pub fn finish_run(
        &self,
        run_id: &str,
        counters: RunCounters,
        finished_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE import_run
            SET rows_processed = ?2,
                rows_saved = ?3,
                exception_count = ?4,
                aborted = ?5,
                finished_at = ?6
            WHERE run_id = ?1
            "#,
            params![
                run_id,
                counters.rows_processed as i64,
                counters.rows_saved as i64,
                counters.exception_count as i64,
                counters.aborted,
                finished_at,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "import_run".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn find_run(&self, run_id: &str) -> RepositoryResult<Option<ImportRunEntity>> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"
            SELECT run_id, source, rows_processed, rows_saved, exception_count,
                   aborted, started_at, finished_at
            FROM import_run
            WHERE run_id = ?1
            "#,
            params![run_id],
            map_run_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 最近的运行记录（按开始时间倒序）
    pub fn list_recent_runs(&self, limit: usize) -> RepositoryResult<Vec<ImportRunEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, source, rows_processed, rows_saved, exception_count,
                   aborted, started_at, finished_at
            FROM import_run
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )?;
        let runs = stmt
            .query_map(params![limit as i64], map_run_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== 行数据 =====

    /// 保存一行（payload 为按字段顺序序列化的 JSON 对象）
    pub fn insert_row(
        &self,
        run_id: &str,
        row_index: usize,
        values: &RowValues,
        imported_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let payload = serde_json::to_string(values)?;
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO imported_row (run_id, row_index, payload, imported_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, row_index as i64, payload, imported_at],
        )?;
        Ok(())
    }

    pub fn list_rows(&self, run_id: &str) -> RepositoryResult<Vec<ImportedRowEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT row_index, payload, imported_at
            FROM imported_row
            WHERE run_id = ?1
            ORDER BY row_index
            "#,
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, NaiveDateTime>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(row_index, payload, imported_at)| {
                Ok(ImportedRowEntity {
                    row_index: row_index as usize,
                    payload: serde_json::from_str(&payload)?,
                    imported_at,
                })
            })
            .collect()
    }

    pub fn count_rows(&self, run_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_row WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ===== 行级错误 =====

    pub fn insert_error(&self, run_id: &str, row_index: usize, message: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO import_row_error (run_id, row_index, message) VALUES (?1, ?2, ?3)",
            params![run_id, row_index as i64, message],
        )?;
        Ok(())
    }

    pub fn list_errors(&self, run_id: &str) -> RepositoryResult<Vec<ImportRowErrorEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT row_index, message FROM import_row_error WHERE run_id = ?1 ORDER BY row_index",
        )?;
        let errors = stmt
            .query_map(params![run_id], |row| {
                Ok(ImportRowErrorEntity {
                    row_index: row.get::<_, i64>(0)? as usize,
                    message: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(errors)
    }

    pub fn count_errors(&self, run_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM import_row_error WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<ImportRunEntity> {
    Ok(ImportRunEntity {
        run_id: row.get(0)?,
        source: row.get(1)?,
        rows_processed: row.get(2)?,
        rows_saved: row.get(3)?,
        exception_count: row.get(4)?,
        aborted: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::value::Value;

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    #[test]
    fn test_run_lifecycle() {
        let repo = SqliteRowRepository::in_memory().unwrap();
        repo.begin_run("run-1", "data.csv", now()).unwrap();

        let mut values = RowValues::new();
        values.insert("id", Value::Int(1));
        values.insert("name", Value::from("Ann"));
        repo.insert_row("run-1", 0, &values, now()).unwrap();
        repo.insert_error("run-1", 1, "必填字段缺失").unwrap();

        let counters = RunCounters {
            rows_processed: 2,
            rows_saved: 1,
            exception_count: 1,
            aborted: true,
        };
        repo.finish_run("run-1", counters, now()).unwrap();

        let run = repo.find_run("run-1").unwrap().unwrap();
        assert_eq!(run.source, "data.csv");
        assert_eq!(run.rows_processed, 2);
        assert_eq!(run.rows_saved, 1);
        assert!(run.aborted);
        assert!(run.finished_at.is_some());

        let rows = repo.list_rows("run-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload, serde_json::json!({"id": 1, "name": "Ann"}));
        assert_eq!(repo.count_errors("run-1").unwrap(), 1);
    }

    #[test]
    fn test_row_requires_existing_run() {
        let repo = SqliteRowRepository::in_memory().unwrap();
        let result = repo.insert_row("missing", 0, &RowValues::new(), now());
        assert!(matches!(result, Err(RepositoryError::ForeignKeyViolation(_))));
    }

    #[test]
    fn test_finish_unknown_run_is_not_found() {
        let repo = SqliteRowRepository::in_memory().unwrap();
        let result = repo.finish_run("missing", RunCounters::default(), now());
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_row_index_rejected() {
        let repo = SqliteRowRepository::in_memory().unwrap();
        repo.begin_run("run-1", "mem", now()).unwrap();
        repo.insert_row("run-1", 0, &RowValues::new(), now()).unwrap();
        let result = repo.insert_row("run-1", 0, &RowValues::new(), now());
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
    }
}
