use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub study_program: String,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        study_program: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            study_program: study_program.into(),
        }
    }
}

/// 匯入檔案中的一列資料 (id, name, program code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: String,
    pub name: String,
    pub program_code: String,
}

impl ImportRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        program_code: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            program_code: program_code.into(),
        }
    }
}

/// 作業提交工作的序號，由單一 worker 處理一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssignmentJob(pub usize);
