pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::CsvRecordSource;
pub use config::PortalConfig;
pub use crate::core::{
    import::{ImportConfig, ImportCoordinator, ImportFailure, ImportReport},
    registry::{ChangeStudyProgram, Registry, RegistryConfig, Rename},
    scheduler::{AssignmentScheduler, SchedulerConfig, SchedulerReport},
};
pub use domain::{
    catalog::StudyProgramCatalog,
    model::{AssignmentJob, ImportRecord, Student},
    ports::{RecordSource, StudentMutator},
};
pub use utils::error::{ErrorCategory, PortalError, Result};
