use crate::domain::model::ImportRecord;
use crate::domain::ports::RecordSource;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const FIELDS_PER_ROW: usize = 3;

/// 以 CSV 格式讀取 `id,name,program_code` 的資料來源
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    base_dir: Option<PathBuf>,
    has_headers: bool,
    delimiter: u8,
}

impl CsvRecordSource {
    pub fn new() -> Self {
        Self {
            base_dir: None,
            has_headers: false,
            delimiter: b',',
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) if Path::new(path).is_relative() => base.join(path),
            _ => PathBuf::from(path),
        }
    }

    /// `.tsv` 檔一律以 tab 分隔，其他副檔名使用設定的分隔字元
    fn delimiter_for(&self, path: &str) -> u8 {
        let is_tsv = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
        if is_tsv {
            b'\t'
        } else {
            self.delimiter
        }
    }

    /// 解析整個檔案內容；任何一列欄位數不對就視為整個來源格式錯誤
    pub fn parse_bytes(&self, path: &str, data: &[u8]) -> Result<Vec<ImportRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter_for(path))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);

            if row.len() != FIELDS_PER_ROW {
                return Err(PortalError::SourceMalformed {
                    path: path.to_string(),
                    line,
                    reason: format!("expected {} fields, found {}", FIELDS_PER_ROW, row.len()),
                });
            }

            records.push(ImportRecord::new(&row[0], &row[1], &row[2]));
        }

        Ok(records)
    }
}

impl Default for CsvRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    async fn parse_records(&self, path: &str) -> Result<Vec<ImportRecord>> {
        let full_path = self.resolve(path);
        let data = tokio::fs::read(&full_path)
            .await
            .map_err(|source| PortalError::SourceUnreadable {
                path: path.to_string(),
                source,
            })?;

        let records = self.parse_bytes(path, &data)?;
        tracing::debug!(path, records = records.len(), "Parsed source file");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_parse_bytes_trims_fields() {
        let source = CsvRecordSource::new();
        let records = source
            .parse_bytes("inline", b"A1, Bob ,TI\nA2,Dee,TK\n")
            .unwrap();

        assert_eq!(
            records,
            vec![
                ImportRecord::new("A1", "Bob", "TI"),
                ImportRecord::new("A2", "Dee", "TK"),
            ]
        );
    }

    #[test]
    fn test_parse_bytes_rejects_wrong_field_count() {
        let source = CsvRecordSource::new();
        let err = source
            .parse_bytes("bad.csv", b"A1,Bob,TI\nA2,Dee\n")
            .unwrap_err();

        match err {
            PortalError::SourceMalformed { path, line, reason } => {
                assert_eq!(path, "bad.csv");
                assert_eq!(line, 2);
                assert!(reason.contains("found 2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bytes_with_headers_and_delimiter() {
        let source = CsvRecordSource::new()
            .with_headers(true)
            .with_delimiter(b';');
        let records = source
            .parse_bytes("inline", b"id;name;program\nA1;Bob;TI\n")
            .unwrap();

        assert_eq!(records, vec![ImportRecord::new("A1", "Bob", "TI")]);
    }

    #[tokio::test]
    async fn test_tsv_files_are_tab_separated() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("students.TSV"),
            "A1\tBob\tTI\nA2\tDee, Jr.\tTK\n",
        )
        .unwrap();

        let source = CsvRecordSource::new().with_base_dir(temp_dir.path());
        let records = source.parse_records("students.TSV").await.unwrap();

        assert_eq!(
            records,
            vec![
                ImportRecord::new("A1", "Bob", "TI"),
                ImportRecord::new("A2", "Dee, Jr.", "TK"),
            ]
        );
        // 其他副檔名仍使用逗號
        assert!(source.parse_bytes("students.csv", b"A1\tBob\tTI\n").is_err());
    }

    #[test]
    fn test_parse_bytes_empty_input() {
        let source = CsvRecordSource::new();
        assert!(source.parse_bytes("empty", b"").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_records_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"A1,Bob,TI\nA2,Dee,TK\n").unwrap();

        let source = CsvRecordSource::new();
        let path = temp_file.path().to_str().unwrap();
        let records = source.parse_records(path).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Dee");
    }

    #[tokio::test]
    async fn test_parse_records_relative_to_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("f1.csv"), "A1,Bob,TI\n").unwrap();

        let source = CsvRecordSource::new().with_base_dir(temp_dir.path());
        let records = source.parse_records("f1.csv").await.unwrap();

        assert_eq!(records, vec![ImportRecord::new("A1", "Bob", "TI")]);
    }

    #[tokio::test]
    async fn test_parse_records_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvRecordSource::new().with_base_dir(temp_dir.path());

        let err = source.parse_records("missing.csv").await.unwrap_err();
        assert!(matches!(err, PortalError::SourceUnreadable { ref path, .. } if path == "missing.csv"));
    }
}
