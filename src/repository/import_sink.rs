// ==========================================
// 表格行导入管道 - SQLite 落库回调
// ==========================================
// 职责: 以 ImportHandler 形式把导入结果写入 SqliteRowRepository
// 生命周期: before_run 建立运行记录 → save/on_error 写行 → after_run 回写导入器的最终计数
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_handler_trait::{ErrorAction, ImportHandler};
use crate::importer::orchestrator::RunState;
use crate::importer::row_access::RowAccess;
use crate::importer::row_values::RowValues;
use crate::repository::import_row_repo::{RunCounters, SqliteRowRepository};
use tracing::{debug, error, info};
use uuid::Uuid;

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub struct SqliteSink {
    repo: SqliteRowRepository,
    source: String,
    error_action: ErrorAction,
    run_id: Option<String>,
}

impl SqliteSink {
    /// # 参数
    /// - repo: 目标仓储
    /// - source: 数据源描述（通常为文件路径），写入 import_run.source
    pub fn new(repo: SqliteRowRepository, source: impl Into<String>) -> Self {
        Self {
            repo,
            source: source.into(),
            error_action: ErrorAction::Stop,
            run_id: None,
        }
    }

    /// 行级错误后的处理策略（默认 Stop）
    pub fn with_error_action(mut self, action: ErrorAction) -> Self {
        self.error_action = action;
        self
    }

    pub fn repository(&self) -> &SqliteRowRepository {
        &self.repo
    }

    /// 最近一次运行的记录 ID（before_run 之后可用）
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn current_run(&self) -> ImportResult<&str> {
        self.run_id
            .as_deref()
            .ok_or_else(|| ImportError::configuration("SqliteSink 未初始化运行记录"))
    }
}

impl ImportHandler for SqliteSink {
    fn before_run(&mut self) -> ImportResult<()> {
        // 建档失败时不能沿用上一次运行的记录
        self.run_id = None;
        let run_id = Uuid::new_v4().to_string();
        self.repo.begin_run(&run_id, &self.source, now())?;
        info!(run_id = %run_id, source = %self.source, "导入运行记录已创建");
        self.run_id = Some(run_id);
        Ok(())
    }

    fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()> {
        let run_id = self.current_run()?;
        self.repo
            .insert_row(run_id, row_index, &values, now())
            .map_err(|e| ImportError::Save {
                row: row_index,
                message: e.to_string(),
            })?;
        debug!(row_index, "行已写入");
        Ok(())
    }

    fn on_error(&mut self, row_index: usize, _row: &dyn RowAccess, err: &ImportError) -> ErrorAction {
        if let Some(run_id) = self.run_id.as_deref() {
            if let Err(e) = self.repo.insert_error(run_id, row_index, &err.to_string()) {
                error!(row_index, error = %e, "行级错误写入失败");
            }
        }
        self.error_action
    }

    fn after_run(&mut self, state: &RunState) {
        // before_run 失败时没有运行记录可回写
        let Some(run_id) = self.run_id.as_deref() else {
            return;
        };
        let counters = RunCounters::from(state);
        match self.repo.finish_run(run_id, counters, now()) {
            Ok(()) => info!(
                run_id = %run_id,
                saved = counters.rows_saved,
                exceptions = counters.exception_count,
                aborted = counters.aborted,
                "导入运行记录已完成"
            ),
            Err(e) => error!(run_id = %run_id, error = %e, "导入运行记录回写失败"),
        }
    }
}
