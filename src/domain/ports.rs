use crate::domain::catalog::StudyProgramCatalog;
use crate::domain::model::{ImportRecord, Student};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 外部資料來源：把一個來源 (檔案路徑等) 解析成匯入記錄
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn parse_records(&self, path: &str) -> Result<Vec<ImportRecord>>;
}

/// 修改學生資料的策略，在 registry 的鎖內執行
pub trait StudentMutator {
    fn apply(self, student: &mut Student, catalog: &StudyProgramCatalog) -> Result<()>;
}

impl<F> StudentMutator for F
where
    F: FnOnce(&mut Student, &StudyProgramCatalog) -> Result<()>,
{
    fn apply(self, student: &mut Student, catalog: &StudyProgramCatalog) -> Result<()> {
        self(student, catalog)
    }
}
