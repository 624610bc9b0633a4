use crate::domain::catalog::StudyProgramCatalog;
use crate::domain::model::Student;
use crate::domain::ports::StudentMutator;
use crate::utils::error::{PortalError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// 連續登入失敗達到此次數後鎖定帳號
    pub lockout_threshold: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
        }
    }
}

struct RegistryState {
    students: Vec<Student>,
    // id -> students 內的位置
    index: HashMap<String, usize>,
    catalog: StudyProgramCatalog,
    failed_logins: HashMap<String, u32>,
}

/// 學生名冊
///
/// 學生清單、學程對照表與登入失敗計數共用同一把鎖，每個公開方法在整個
/// 臨界區內持有它，因此「檢查 id 是否重複 + 新增」這類讀改寫序列是原子的。
pub struct Registry {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new(catalog: StudyProgramCatalog, config: RegistryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RegistryState {
                students: Vec::new(),
                index: HashMap::new(),
                catalog,
                failed_logins: HashMap::new(),
            }),
        }
    }

    pub fn with_catalog(catalog: StudyProgramCatalog) -> Self {
        Self::new(catalog, RegistryConfig::default())
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Mutators run on a working copy, so a panic inside one never leaves
        // the stored state half-written.
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn register(&self, id: &str, name: &str, program_code: &str) -> Result<String> {
        require_non_empty("id", id)?;
        require_non_empty("name", name)?;
        require_non_empty("study_program", program_code)?;

        let mut state = self.lock();

        if !state.catalog.contains(program_code) {
            return Err(PortalError::UnknownProgram {
                code: program_code.to_string(),
            });
        }

        if state.index.contains_key(id) {
            return Err(PortalError::DuplicateId { id: id.to_string() });
        }

        let position = state.students.len();
        state.students.push(Student::new(id, name, program_code));
        state.index.insert(id.to_string(), position);

        tracing::debug!(id, name, program = program_code, "Student registered");
        Ok(format!("Registration successful: {} ({})", name, id))
    }

    pub fn login(&self, id: &str, name: &str) -> Result<String> {
        let mut state = self.lock();

        let attempts = state.failed_logins.get(id).copied().unwrap_or(0);
        if attempts >= self.config.lockout_threshold {
            tracing::warn!(id, attempts, "Login rejected, account locked");
            return Err(PortalError::LockedOut {
                id: id.to_string(),
                attempts,
            });
        }

        let program_code = state
            .index
            .get(id)
            .map(|&position| &state.students[position])
            .filter(|student| student.name == name)
            .map(|student| student.study_program.clone());

        match program_code {
            Some(code) => {
                state.failed_logins.remove(id);
                let program = state
                    .catalog
                    .lookup(&code)
                    .ok_or(PortalError::ProgramNotFound { code: code.clone() })?;
                Ok(format!(
                    "Login successful: welcome {}! Study program: {}",
                    name, program
                ))
            }
            None => {
                // 未註冊的 id 也會建立計數，map 會隨嘗試過的不同 id 數量成長
                let counter = state.failed_logins.entry(id.to_string()).or_insert(0);
                *counter += 1;
                tracing::debug!(id, attempts = *counter, "Login failed");
                Err(PortalError::AuthFailed { id: id.to_string() })
            }
        }
    }

    /// 找出第一位同名學生並套用 mutator。
    ///
    /// mutator 作用在副本上，只有成功且結果仍符合名冊的不變量 (欄位非空、
    /// 學程存在、id 不變) 時才寫回；失敗時原記錄保持不變。
    pub fn modify_student<M: StudentMutator>(&self, name: &str, mutator: M) -> Result<String> {
        let mut state = self.lock();

        let position = state
            .students
            .iter()
            .position(|student| student.name == name)
            .ok_or_else(|| PortalError::StudentNotFound {
                name: name.to_string(),
            })?;

        let mut working = state.students[position].clone();
        mutator.apply(&mut working, &state.catalog)?;

        require_non_empty("name", &working.name)?;
        require_non_empty("study_program", &working.study_program)?;
        if !state.catalog.contains(&working.study_program) {
            return Err(PortalError::UnknownProgram {
                code: working.study_program,
            });
        }
        // id 是索引鍵，註冊後不可更改
        if working.id != state.students[position].id {
            return Err(PortalError::IdChanged {
                from: state.students[position].id.clone(),
                to: working.id,
            });
        }

        let message = format!("Student {} updated", working.name);
        state.students[position] = working;
        Ok(message)
    }

    pub fn get_study_program(&self, code: &str) -> Result<String> {
        let state = self.lock();
        state
            .catalog
            .lookup(code)
            .map(str::to_string)
            .ok_or_else(|| PortalError::UnknownProgram {
                code: code.to_string(),
            })
    }

    /// 目前名冊的複本；呼叫端永遠拿不到內部集合的參考
    pub fn snapshot(&self) -> Vec<Student> {
        self.lock().students.clone()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Student> {
        let state = self.lock();
        state
            .index
            .get(id)
            .map(|&position| state.students[position].clone())
    }

    pub fn failed_attempts(&self, id: &str) -> u32 {
        self.lock().failed_logins.get(id).copied().unwrap_or(0)
    }

    pub fn catalog(&self) -> StudyProgramCatalog {
        self.lock().catalog.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().students.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_catalog(StudyProgramCatalog::default())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::EmptyField { field });
    }
    Ok(())
}

/// 更改學生姓名
#[derive(Debug, Clone)]
pub struct Rename(pub String);

impl StudentMutator for Rename {
    fn apply(self, student: &mut Student, _catalog: &StudyProgramCatalog) -> Result<()> {
        require_non_empty("name", &self.0)?;
        student.name = self.0;
        Ok(())
    }
}

/// 轉換學程，代碼必須存在於對照表
#[derive(Debug, Clone)]
pub struct ChangeStudyProgram(pub String);

impl StudentMutator for ChangeStudyProgram {
    fn apply(self, student: &mut Student, catalog: &StudyProgramCatalog) -> Result<()> {
        if !catalog.contains(&self.0) {
            return Err(PortalError::UnknownProgram { code: self.0 });
        }
        student.study_program = self.0;
        Ok(())
    }
}
