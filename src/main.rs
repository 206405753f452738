// ==========================================
// 表格行导入管道 - 命令行入口
// ==========================================
// 用法: tabular-import <config.json> [--db <path>]
// 退出码: 0 = 完成；1 = 配置/数据源错误；2 = 因行级错误中止
// ==========================================

use anyhow::Context;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tabular_import::config::ImportConfig;
use tabular_import::importer::{open_rows, Importer, RunSummary};
use tabular_import::logging;
use tabular_import::repository::{SqliteRowRepository, SqliteSink};

#[derive(Parser, Debug)]
#[command(name = "tabular-import", version, about = "Import CSV/Excel rows into SQLite")]
struct Args {
    /// Path to the JSON import configuration.
    config: PathBuf,

    /// SQLite database path (overrides the config file and TABULAR_IMPORT_DB_PATH).
    #[arg(long)]
    db: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("{} v{}", tabular_import::APP_NAME, tabular_import::VERSION);

    match run(&args) {
        Ok(summary) => {
            if let Err(e) = print_summary(&summary) {
                tracing::error!(error = %e, "无法输出运行汇总");
            }
            if summary.aborted {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            let _ = writeln!(io::stderr(), "error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let config = ImportConfig::load(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;

    let db_path = config.database_path(args.db.as_deref());
    tracing::info!("使用数据库: {}", db_path);
    let repo = SqliteRowRepository::new(&db_path)?;

    let source = config.source.path.display().to_string();
    let rows = open_rows(&config.source.path, &config.source.options)
        .with_context(|| format!("打开数据源失败: {}", source))?;

    let sink = SqliteSink::new(repo, source).with_error_action(config.error_action());
    let mut importer = Importer::new(config.field_set(), sink);
    let summary = importer.try_run(rows)?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, summary)?;
    writeln!(stdout)?;
    Ok(())
}
