// ==========================================
// 表格导入系统 - 命令行入口
// ==========================================
// 用法: tabular-import <import-type> <file> [db-path]
// 输出: BatchResult (JSON)
// ==========================================

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabular_import::db::default_db_path;
use tabular_import::{logging, FieldMapping, ImportApi};
use tracing::{error, info};

fn print_usage() {
    eprintln!("{} {}", tabular_import::APP_NAME, tabular_import::VERSION);
    eprintln!();
    eprintln!("用法: tabular-import <import-type> <file> [db-path]");
    eprintln!("  import-type: user | contact | ticket | organization | group | customfield");
    eprintln!("  file:        .csv 或 .xlsx 文件");
    eprintln!("  db-path:     SQLite 数据库路径（默认: $TABULAR_IMPORT_DB_PATH 或本地数据目录）");
}

async fn run(import_type: &str, file: &Path, db_path: &Path) -> anyhow::Result<String> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let api = ImportApi::new(&db_path.to_string_lossy()).await?;

    // 有默认模板时使用模板映射
    let mapping = api
        .get_default_template(import_type)
        .await?
        .map(|template| template.mapping)
        .unwrap_or_else(FieldMapping::new);

    let result = api.import_file(import_type, file, &mapping).await?;
    info!(
        import_type = %result.import_type,
        success = result.success_count,
        errors = result.error_count,
        "导入结束"
    );

    Ok(serde_json::to_string_pretty(&result)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        print_usage();
        return ExitCode::from(2);
    }

    let import_type = &args[0];
    let file = PathBuf::from(&args[1]);
    let db_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    info!(db_path = %db_path.display(), "使用数据库");

    match run(import_type, &file, &db_path).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "导入失败");
            eprintln!("导入失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
