use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("field `{field}` must not be empty")]
    EmptyField { field: &'static str },

    #[error("unknown study program: {code}")]
    UnknownProgram { code: String },

    #[error("student id {id} is already registered")]
    DuplicateId { id: String },

    #[error("student id {from} cannot be changed to {to}")]
    IdChanged { from: String, to: String },

    #[error("no student named {name}")]
    StudentNotFound { name: String },

    #[error("study program {code} not found in catalog")]
    ProgramNotFound { code: String },

    #[error("login failed for {id}: id and name do not match")]
    AuthFailed { id: String },

    #[error("account {id} is locked after {attempts} failed login attempts")]
    LockedOut { id: String, attempts: u32 },

    #[error("cannot read source {path}: {source}")]
    SourceUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed source {path} at line {line}: {reason}")]
    SourceMalformed {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid config value for `{field}` ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

/// 錯誤分類，對應 registry / import / config 各層的錯誤族群
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Auth,
    Source,
    Config,
    Internal,
}

impl PortalError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::EmptyField { .. }
            | PortalError::UnknownProgram { .. }
            | PortalError::IdChanged { .. } => ErrorCategory::Validation,
            PortalError::DuplicateId { .. } => ErrorCategory::Conflict,
            PortalError::StudentNotFound { .. } | PortalError::ProgramNotFound { .. } => {
                ErrorCategory::NotFound
            }
            PortalError::AuthFailed { .. } | PortalError::LockedOut { .. } => ErrorCategory::Auth,
            PortalError::SourceUnreadable { .. }
            | PortalError::SourceMalformed { .. }
            | PortalError::CsvError(_) => ErrorCategory::Source,
            PortalError::ConfigError { .. }
            | PortalError::InvalidConfigValueError { .. }
            | PortalError::TomlError(_) => ErrorCategory::Config,
            PortalError::IoError(_)
            | PortalError::SerializationError(_)
            | PortalError::TaskJoinError(_) => ErrorCategory::Internal,
        }
    }

    /// 資料本身造成、只影響單筆記錄或單一檔案的錯誤；其餘錯誤在匯入報告中另列為非預期
    pub fn is_record_level(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation
                | ErrorCategory::Conflict
                | ErrorCategory::NotFound
                | ErrorCategory::Source
        )
    }

    /// CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Config => 2,
            ErrorCategory::Internal => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
