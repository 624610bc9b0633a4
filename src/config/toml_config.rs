use crate::adapters::CsvRecordSource;
use crate::core::import::{ImportConfig, DEFAULT_CONSUMERS, DEFAULT_QUEUE_CAPACITY};
use crate::core::registry::{RegistryConfig, DEFAULT_LOCKOUT_THRESHOLD};
use crate::core::scheduler::{
    SchedulerConfig, DEFAULT_JOB_QUEUE_CAPACITY, DEFAULT_LATENCY, DEFAULT_WORKERS,
};
use crate::domain::catalog::StudyProgramCatalog;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    pub registry: Option<RegistrySection>,
    /// 學程代碼 -> 名稱；未設定時使用內建對照表
    pub catalog: Option<BTreeMap<String, String>>,
    pub import: Option<ImportSection>,
    pub assignments: Option<AssignmentSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySection {
    pub lockout_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSection {
    pub queue_capacity: Option<usize>,
    pub consumers: Option<usize>,
    pub has_headers: Option<bool>,
    pub delimiter: Option<String>,
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentSection {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}

impl PortalConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${PORTAL_CONSUMERS})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PortalError::ConfigError {
            message: format!("invalid env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn lockout_threshold(&self) -> u32 {
        self.registry
            .as_ref()
            .and_then(|r| r.lockout_threshold)
            .unwrap_or(DEFAULT_LOCKOUT_THRESHOLD)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            lockout_threshold: self.lockout_threshold(),
        }
    }

    pub fn catalog(&self) -> StudyProgramCatalog {
        match &self.catalog {
            Some(programs) => StudyProgramCatalog::new(programs.clone()),
            None => StudyProgramCatalog::default(),
        }
    }

    pub fn import_config(&self) -> ImportConfig {
        let section = self.import.clone().unwrap_or_default();
        ImportConfig {
            queue_capacity: section.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            consumers: section.consumers.unwrap_or(DEFAULT_CONSUMERS),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let section = self.assignments.clone().unwrap_or_default();
        SchedulerConfig {
            workers: section.workers.unwrap_or(DEFAULT_WORKERS),
            queue_capacity: section.queue_capacity.unwrap_or(DEFAULT_JOB_QUEUE_CAPACITY),
            latency: section
                .latency_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LATENCY),
        }
    }

    pub fn delimiter(&self) -> Result<u8> {
        let Some(delimiter) = self.import.as_ref().and_then(|i| i.delimiter.as_deref()) else {
            return Ok(b',');
        };
        match delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(PortalError::InvalidConfigValueError {
                field: "import.delimiter".to_string(),
                value: delimiter.to_string(),
                reason: "Delimiter must be a single ASCII character".to_string(),
            }),
        }
    }

    /// 依 [import] 區段建立 CSV 資料來源
    pub fn record_source(&self) -> Result<CsvRecordSource> {
        let section = self.import.clone().unwrap_or_default();
        let mut source = CsvRecordSource::new()
            .with_headers(section.has_headers.unwrap_or(false))
            .with_delimiter(self.delimiter()?);
        if let Some(base_dir) = section.base_dir {
            source = source.with_base_dir(base_dir);
        }
        Ok(source)
    }

    pub fn verbose_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.verbose).unwrap_or(false)
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_range("registry.lockout_threshold", self.lockout_threshold(), 1, 1000)?;

        if let Some(programs) = &self.catalog {
            if programs.is_empty() {
                return Err(PortalError::InvalidConfigValueError {
                    field: "catalog".to_string(),
                    value: String::new(),
                    reason: "Catalog must contain at least one study program".to_string(),
                });
            }
            for (code, name) in programs {
                validate_non_empty_string("catalog", code)?;
                validate_non_empty_string(&format!("catalog.{}", code), name)?;
            }
        }

        let import = self.import_config();
        validate_positive_number("import.queue_capacity", import.queue_capacity, 1)?;
        validate_positive_number("import.consumers", import.consumers, 1)?;
        self.delimiter()?;
        if let Some(base_dir) = self.import.as_ref().and_then(|i| i.base_dir.as_deref()) {
            validate_path("import.base_dir", base_dir)?;
        }

        let scheduler = self.scheduler_config();
        validate_positive_number("assignments.workers", scheduler.workers, 1)?;
        validate_positive_number("assignments.queue_capacity", scheduler.queue_capacity, 1)?;

        Ok(())
    }
}

impl Validate for PortalConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
