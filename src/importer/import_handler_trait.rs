// ==========================================
// 表格行导入管道 - 导入回调 Trait
// ==========================================
// 职责: 定义导入器生命周期回调接口（不包含存储实现）
// 调用顺序: before_run → [clean_record → save | on_error]* → after_run
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::orchestrator::RunState;
use crate::importer::row_access::RowAccess;
use crate::importer::row_values::RowValues;

/// 错误策略返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// 记录后继续处理下一行
    Continue,
    /// 中止本次运行（不再读取后续行）
    Stop,
}

impl From<bool> for ErrorAction {
    fn from(proceed: bool) -> Self {
        if proceed {
            ErrorAction::Continue
        } else {
            ErrorAction::Stop
        }
    }
}

// ==========================================
// ImportHandler Trait
// ==========================================
// 用途: 导入器的落库与生命周期回调
// 实现者: SqliteSink、FnHandler、测试用 Recorder
pub trait ImportHandler {
    /// 运行前回调
    ///
    /// # 说明
    /// - 失败时跳过全部行，但 after_run 仍会执行
    fn before_run(&mut self) -> ImportResult<()> {
        Ok(())
    }

    /// 保存一行结果
    ///
    /// # 参数
    /// - row_index: 行号（从 0 开始，按数据源顺序）
    /// - values: 整行清洗后的结果
    ///
    /// # 返回
    /// - Err: 计入异常数，交由 on_error 决定是否继续
    fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()>;

    /// 整行清洗（所有字段清洗完成后、保存前调用）
    fn clean_record(&mut self, _row_index: usize, values: RowValues) -> ImportResult<RowValues> {
        Ok(values)
    }

    /// 错误策略
    ///
    /// # 参数
    /// - row_index: 出错行号
    /// - row: 出错的原始行
    /// - error: 解析/转换/清洗/保存过程中的错误
    ///
    /// # 返回
    /// - ErrorAction::Continue: 继续下一行
    /// - ErrorAction::Stop: 中止运行（默认）
    fn on_error(
        &mut self,
        _row_index: usize,
        _row: &dyn RowAccess,
        _error: &ImportError,
    ) -> ErrorAction {
        ErrorAction::Stop
    }

    /// 运行后回调
    ///
    /// # 参数
    /// - state: 本次运行的最终状态（阶段已为终态，计数为导入器的实际计数）
    ///
    /// # 说明
    /// - 无论正常完成、中止、配置错误还是数据源错误，都恰好调用一次
    fn after_run(&mut self, _state: &RunState) {}
}

impl<H: ImportHandler + ?Sized> ImportHandler for &mut H {
    fn before_run(&mut self) -> ImportResult<()> {
        (**self).before_run()
    }

    fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()> {
        (**self).save(row_index, values)
    }

    fn clean_record(&mut self, row_index: usize, values: RowValues) -> ImportResult<RowValues> {
        (**self).clean_record(row_index, values)
    }

    fn on_error(&mut self, row_index: usize, row: &dyn RowAccess, error: &ImportError) -> ErrorAction {
        (**self).on_error(row_index, row, error)
    }

    fn after_run(&mut self, state: &RunState) {
        (**self).after_run(state)
    }
}

// ==========================================
// FnHandler - 闭包落库
// ==========================================
pub struct FnHandler<F> {
    save: F,
}

impl<F> FnHandler<F>
where
    F: FnMut(usize, RowValues) -> ImportResult<()>,
{
    pub fn new(save: F) -> Self {
        Self { save }
    }
}

impl<F> ImportHandler for FnHandler<F>
where
    F: FnMut(usize, RowValues) -> ImportResult<()>,
{
    fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()> {
        (self.save)(row_index, values)
    }
}

// ==========================================
// ContinueOnError - 出错继续策略
// ==========================================
// 包装任意回调，将默认的"出错即停"改为"记录后继续"
pub struct ContinueOnError<H> {
    inner: H,
}

impl<H: ImportHandler> ContinueOnError<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: ImportHandler> ImportHandler for ContinueOnError<H> {
    fn before_run(&mut self) -> ImportResult<()> {
        self.inner.before_run()
    }

    fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()> {
        self.inner.save(row_index, values)
    }

    fn clean_record(&mut self, row_index: usize, values: RowValues) -> ImportResult<RowValues> {
        self.inner.clean_record(row_index, values)
    }

    fn on_error(&mut self, row_index: usize, row: &dyn RowAccess, error: &ImportError) -> ErrorAction {
        // 内层回调仍可观察错误（如记录到错误表）
        self.inner.on_error(row_index, row, error);
        ErrorAction::Continue
    }

    fn after_run(&mut self, state: &RunState) {
        self.inner.after_run(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::value::Value;
    use std::collections::HashMap;

    #[test]
    fn test_default_policy_is_stop() {
        let mut handler = FnHandler::new(|_, _| Ok(()));
        let row: HashMap<String, String> = HashMap::new();
        let err = ImportError::configuration("x");
        assert_eq!(handler.on_error(0, &row, &err), ErrorAction::Stop);
    }

    #[test]
    fn test_continue_on_error_wrapper() {
        let mut handler = ContinueOnError::new(FnHandler::new(|_, _| Ok(())));
        let row = vec![Value::Null];
        let err = ImportError::configuration("x");
        assert_eq!(handler.on_error(3, &row, &err), ErrorAction::Continue);
    }

    #[test]
    fn test_error_action_from_bool() {
        assert_eq!(ErrorAction::from(true), ErrorAction::Continue);
        assert_eq!(ErrorAction::from(false), ErrorAction::Stop);
    }
}
