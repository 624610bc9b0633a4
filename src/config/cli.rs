use crate::config::toml_config::{AssignmentSection, ImportSection, PortalConfig};
use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extensions, validate_path, Validate};
use clap::{Parser, Subcommand};

const IMPORT_EXTENSIONS: [&str; 3] = ["csv", "txt", "tsv"];

#[derive(Debug, Clone, Parser)]
#[command(name = "student-portal")]
#[command(about = "Concurrent student registry with bulk import and assignment scheduling")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Import students from CSV files (id,name,program per row)
    Import {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long)]
        consumers: Option<usize>,

        #[arg(long)]
        queue_capacity: Option<usize>,

        #[arg(long)]
        has_headers: bool,

        /// Print the import report as JSON
        #[arg(long)]
        report_json: bool,
    },
    /// Submit a batch of simulated assignments
    Assign {
        count: usize,

        #[arg(long)]
        workers: Option<usize>,

        #[arg(long)]
        latency_ms: Option<u64>,
    },
    /// List the study program catalog
    Programs,
}

impl CliConfig {
    /// 載入 TOML 配置 (若有指定) 並套用命令列覆蓋設定
    pub fn load_portal_config(&self) -> Result<PortalConfig> {
        let mut config = match &self.config {
            Some(path) => PortalConfig::from_file(path)?,
            None => PortalConfig::default(),
        };

        match &self.command {
            Command::Import {
                consumers,
                queue_capacity,
                has_headers,
                ..
            } => {
                let section = config.import.get_or_insert_with(ImportSection::default);
                if consumers.is_some() {
                    section.consumers = *consumers;
                }
                if queue_capacity.is_some() {
                    section.queue_capacity = *queue_capacity;
                }
                if *has_headers {
                    section.has_headers = Some(true);
                }
            }
            Command::Assign {
                workers,
                latency_ms,
                ..
            } => {
                let section = config
                    .assignments
                    .get_or_insert_with(AssignmentSection::default);
                if workers.is_some() {
                    section.workers = *workers;
                }
                if latency_ms.is_some() {
                    section.latency_ms = *latency_ms;
                }
            }
            Command::Programs => {}
        }

        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.config {
            validate_path("config", path)?;
        }
        if let Command::Import { files, .. } = &self.command {
            validate_file_extensions("files", files, &IMPORT_EXTENSIONS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_command() {
        let cli = CliConfig::parse_from([
            "student-portal",
            "import",
            "f1.csv",
            "f2.csv",
            "--consumers",
            "4",
        ]);

        assert!(cli.validate().is_ok());
        let config = cli.load_portal_config().unwrap();
        assert_eq!(config.import_config().consumers, 4);
        assert_eq!(config.import_config().queue_capacity, 100_000);
    }

    #[test]
    fn test_parse_assign_command() {
        let cli = CliConfig::parse_from([
            "student-portal",
            "--verbose",
            "assign",
            "12",
            "--workers",
            "5",
            "--latency-ms",
            "20",
        ]);

        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Assign { count: 12, .. }));
        let config = cli.load_portal_config().unwrap();
        assert_eq!(config.scheduler_config().workers, 5);
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let cli = CliConfig::parse_from(["student-portal", "import", "students.xlsx"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_zero_workers_override_fails_validation() {
        let cli = CliConfig::parse_from(["student-portal", "assign", "3", "--workers", "0"]);
        assert!(cli.load_portal_config().is_err());
    }
}
