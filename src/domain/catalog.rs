use std::collections::BTreeMap;

/// 學程代碼與名稱的對照表，建立後唯讀
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyProgramCatalog {
    programs: BTreeMap<String, String>,
}

impl StudyProgramCatalog {
    pub fn new<I, K, V>(programs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            programs: programs
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        }
    }

    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.programs.get(code).map(String::as_str)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.programs.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.programs
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }
}

impl Default for StudyProgramCatalog {
    fn default() -> Self {
        Self::new([
            ("TI", "Teknik Informatika"),
            ("TK", "Teknik Komputer"),
            ("SI", "Sistem Informasi"),
            ("MI", "Manajemen Informasi"),
        ])
    }
}
