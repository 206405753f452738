// ==========================================
// 表格行导入管道 - 导入器（编排）
// ==========================================
// 状态机: Idle → Initializing → Running → {Completed, Aborted}
//         配置错误/数据源错误 → Failed
//         任一终态之后必定执行 after_run
// 并发: 单线程顺序处理；同一 Importer 不支持并发运行（run 需要 &mut self）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::FieldSet;
use crate::importer::import_handler_trait::{ErrorAction, ImportHandler};
use crate::importer::row_access::RowAccess;
use crate::importer::row_processor::RowProcessor;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Idle,
    Initializing,
    Running,
    Completed,
    Aborted,
    Failed,
}

// ==========================================
// RunState - 单次运行状态
// ==========================================
// 每次运行开始时重建，仅由导入器修改
// 只记录当前行号，不保留当前行本身：行在处理期间由导入器借用，
// 出错行通过 on_error 的 row 参数交给回调
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: Option<Uuid>,
    pub phase: RunPhase,
    pub current_row_index: Option<usize>,
    pub rows_saved: usize,
    pub rows_processed: usize,
    pub exception_count: usize,
    pub aborted: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            run_id: None,
            phase: RunPhase::Idle,
            current_row_index: None,
            rows_saved: 0,
            rows_processed: 0,
            exception_count: 0,
            aborted: false,
        }
    }
}

impl RunState {
    fn start() -> Self {
        Self {
            run_id: Some(Uuid::new_v4()),
            phase: RunPhase::Initializing,
            ..Self::default()
        }
    }

    fn summary(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            run_id: self.run_id.unwrap_or_default(),
            phase: self.phase,
            rows_processed: self.rows_processed,
            rows_saved: self.rows_saved,
            exception_count: self.exception_count,
            aborted: self.aborted,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// 运行汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub rows_processed: usize,
    pub rows_saved: usize,
    pub exception_count: usize,
    pub aborted: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// 是否全部行均已保存
    pub fn is_clean(&self) -> bool {
        self.phase == RunPhase::Completed && self.exception_count == 0
    }
}

// ==========================================
// Teardown - 运行后回调守卫
// ==========================================
// 离开作用域（含提前返回与 panic 展开）时调用 after_run
// 此时阶段仍未到终态说明运行失败，先标记为 Failed 再回调
struct Teardown<'a, H: ImportHandler> {
    handler: &'a mut H,
    state: &'a mut RunState,
}

impl<'a, H: ImportHandler> Teardown<'a, H> {
    fn new(handler: &'a mut H, state: &'a mut RunState) -> Self {
        Self { handler, state }
    }
}

impl<H: ImportHandler> Drop for Teardown<'_, H> {
    fn drop(&mut self) {
        if !matches!(self.state.phase, RunPhase::Completed | RunPhase::Aborted) {
            self.state.phase = RunPhase::Failed;
        }
        debug!(phase = ?self.state.phase, "执行 after_run");
        self.handler.after_run(&*self.state);
    }
}

// ==========================================
// Importer - 导入器
// ==========================================
pub struct Importer<H: ImportHandler> {
    fields: FieldSet,
    handler: H,
    state: RunState,
}

impl<H: ImportHandler> Importer<H> {
    /// 创建导入器
    ///
    /// # 参数
    /// - fields: 字段配置（构造后不可变）
    /// - handler: 落库与生命周期回调
    pub fn new(fields: impl Into<FieldSet>, handler: H) -> Self {
        Self {
            fields: fields.into(),
            handler,
            state: RunState::default(),
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// 从不会出错的数据源导入
    pub fn run<I>(&mut self, rows: I) -> ImportResult<RunSummary>
    where
        I: IntoIterator,
        I::Item: RowAccess,
    {
        self.try_run(rows.into_iter().map(Ok))
    }

    /// 从可能读取失败的数据源导入
    ///
    /// # 返回
    /// - Ok(RunSummary): 运行结束（可能因错误策略而中止，见 aborted）
    /// - Err: 配置错误、before_run 失败或数据源错误（after_run 已执行）
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub fn try_run<I, R>(&mut self, rows: I) -> ImportResult<RunSummary>
    where
        I: IntoIterator<Item = ImportResult<R>>,
        R: RowAccess,
    {
        let start_time = Instant::now();
        self.state = RunState::start();
        if let Some(run_id) = self.state.run_id {
            tracing::Span::current().record("run_id", tracing::field::display(run_id));
        }
        info!(fields = self.fields.len(), "开始导入");

        let Self {
            fields,
            handler,
            state,
        } = self;

        let outcome = {
            let mut guard = Teardown::new(&mut *handler, &mut *state);
            execute(fields, &mut *guard.state, &mut *guard.handler, rows)
        };

        let summary = state.summary(start_time.elapsed());
        match outcome {
            Ok(()) => {
                info!(
                    processed = summary.rows_processed,
                    saved = summary.rows_saved,
                    exceptions = summary.exception_count,
                    aborted = summary.aborted,
                    elapsed_ms = summary.elapsed_ms,
                    "导入完成"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    error = %e,
                    processed = summary.rows_processed,
                    saved = summary.rows_saved,
                    "导入失败"
                );
                Err(e)
            }
        }
    }
}

fn execute<H, I, R>(
    fields: &FieldSet,
    state: &mut RunState,
    handler: &mut H,
    rows: I,
) -> ImportResult<()>
where
    H: ImportHandler,
    I: IntoIterator<Item = ImportResult<R>>,
    R: RowAccess,
{
    // === Initializing ===
    handler.before_run()?;
    let validated = fields.validate()?;
    let processor = RowProcessor::new(&validated);

    // === Running ===
    state.phase = RunPhase::Running;
    for (row_index, next) in rows.into_iter().enumerate() {
        let row = next?;
        state.current_row_index = Some(row_index);

        match attempt_row(&processor, handler, row_index, &row) {
            Ok(()) => {
                state.rows_saved += 1;
                debug!(row_index, "行已保存");
            }
            Err(err) => {
                state.exception_count += 1;
                warn!(row_index, error = %err, "行处理失败");
                if handler.on_error(row_index, &row, &err) == ErrorAction::Stop {
                    state.aborted = true;
                }
            }
        }

        state.rows_processed += 1;
        state.current_row_index = None;

        if state.aborted {
            warn!(row_index, "错误策略要求中止，停止读取后续行");
            break;
        }
    }

    state.phase = if state.aborted {
        RunPhase::Aborted
    } else {
        RunPhase::Completed
    };
    Ok(())
}

fn attempt_row<H, R>(
    processor: &RowProcessor<'_>,
    handler: &mut H,
    row_index: usize,
    row: &R,
) -> Result<(), ImportError>
where
    H: ImportHandler,
    R: RowAccess,
{
    let values = processor.process(row_index, row, handler)?;
    handler.save(row_index, values)
}
