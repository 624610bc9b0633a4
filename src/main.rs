use clap::Parser;
use std::sync::Arc;
use student_portal::utils::{logger, validation::Validate};
use student_portal::{
    AssignmentScheduler, CliConfig, Command, ImportCoordinator, ImportReport, PortalConfig,
    PortalError, Registry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 驗證命令列參數
    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }

    // 載入配置
    let config = match cli.load_portal_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    // 初始化日誌
    let verbose = cli.verbose || config.verbose_logging();
    if cli.json_log || config.json_logging() {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting student-portal CLI");
    if verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let result = match &cli.command {
        Command::Import {
            files, report_json, ..
        } => run_import(&config, files, *report_json).await,
        Command::Assign { count, .. } => run_assignments(&config, *count).await,
        Command::Programs => {
            list_programs(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run_import(
    config: &PortalConfig,
    files: &[String],
    report_json: bool,
) -> Result<(), PortalError> {
    let registry = Arc::new(Registry::new(config.catalog(), config.registry_config()));
    let coordinator = ImportCoordinator::new(
        Arc::clone(&registry),
        config.record_source()?,
        config.import_config(),
    )?;

    let report = coordinator.run(files).await?;

    if report_json {
        println!("{}", serde_json::to_string_pretty(&report.summary_json())?);
    } else {
        print_import_summary(&registry, &report);
    }

    // 資料問題只寫進報告；I/O 等非預期錯誤以非零結束碼回報
    if let Some(failure) = report.unexpected_failures().next() {
        tracing::error!(
            unexpected = report.unexpected_failures().count(),
            "❌ Import finished with unexpected failures"
        );
        std::process::exit(failure.error.exit_code());
    }

    Ok(())
}

fn print_import_summary(registry: &Registry, report: &ImportReport) {
    println!(
        "✅ Imported {} of {} records from {} file(s) in {:?}",
        report.registered,
        report.records_parsed,
        report.files.len(),
        report.duration
    );
    for failure in &report.failures {
        match &failure.record_id {
            Some(id) => println!("⚠️  {} [{}]: {}", failure.source, id, failure.error),
            None => println!("⚠️  {}: {}", failure.source, failure.error),
        }
    }

    println!("📋 Registered students:");
    let mut students = registry.snapshot();
    students.sort_by(|a, b| a.id.cmp(&b.id));
    for student in students {
        let program = registry
            .get_study_program(&student.study_program)
            .unwrap_or_else(|_| student.study_program.clone());
        println!("  {}  {}  ({})", student.id, student.name, program);
    }
}

async fn run_assignments(config: &PortalConfig, count: usize) -> Result<(), PortalError> {
    let scheduler = AssignmentScheduler::new(config.scheduler_config())?;
    let report = scheduler.run(count).await?;

    println!(
        "✅ {} of {} assignments submitted by {} worker(s) in {:?}",
        report.completed, report.submitted, report.workers, report.elapsed
    );
    Ok(())
}

fn list_programs(config: &PortalConfig) {
    println!("📚 Study programs:");
    for (code, name) in config.catalog().iter() {
        println!("  {}  {}", code, name);
    }
}
