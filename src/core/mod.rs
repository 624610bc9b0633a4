pub mod import;
pub mod registry;
pub mod scheduler;

pub use crate::domain::catalog::StudyProgramCatalog;
pub use crate::domain::model::{AssignmentJob, ImportRecord, Student};
pub use crate::domain::ports::{RecordSource, StudentMutator};
pub use crate::utils::error::Result;
