//! 批次匯入：每個檔案一個 producer 平行解析 (fan-out)，解析結果經由有界佇列
//! 交給固定數量的 consumer 註冊到名冊 (fan-in)。

use crate::core::registry::Registry;
use crate::domain::model::ImportRecord;
use crate::domain::ports::RecordSource;
use crate::utils::error::{ErrorCategory, PortalError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
pub const DEFAULT_CONSUMERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    pub queue_capacity: usize,
    pub consumers: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            consumers: DEFAULT_CONSUMERS,
        }
    }
}

/// 佇列中的一筆記錄，附帶來源檔名以便回報
#[derive(Debug)]
struct QueuedRecord {
    source: Arc<str>,
    record: ImportRecord,
}

/// 單一檔案或單筆記錄的失敗
#[derive(Debug)]
pub struct ImportFailure {
    pub source: String,
    /// 檔案層級的失敗沒有 record id
    pub record_id: Option<String>,
    pub error: PortalError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub source: String,
    pub parsed: usize,
    pub failed: bool,
}

#[derive(Debug)]
pub struct ImportReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub files: Vec<FileSummary>,
    pub records_parsed: usize,
    pub registered: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn file_failures(&self) -> impl Iterator<Item = &ImportFailure> {
        self.failures.iter().filter(|f| f.record_id.is_none())
    }

    pub fn record_failures(&self) -> impl Iterator<Item = &ImportFailure> {
        self.failures.iter().filter(|f| f.record_id.is_some())
    }

    /// 不屬於資料本身問題的失敗 (例如 I/O 或內部錯誤)，CLI 以此決定結束碼
    pub fn unexpected_failures(&self) -> impl Iterator<Item = &ImportFailure> {
        self.failures.iter().filter(|f| !f.error.is_record_level())
    }

    pub fn failures_in(&self, category: ErrorCategory) -> usize {
        self.failures
            .iter()
            .filter(|f| f.error.category() == category)
            .count()
    }

    pub fn summary_json(&self) -> serde_json::Value {
        let failures: Vec<serde_json::Value> = self
            .failures
            .iter()
            .map(|failure| {
                serde_json::json!({
                    "source": failure.source,
                    "record_id": failure.record_id,
                    "category": failure.error.category(),
                    "message": failure.error.to_string(),
                })
            })
            .collect();

        serde_json::json!({
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": self.finished_at.to_rfc3339(),
            "duration_ms": self.duration.as_millis() as u64,
            "files": self.files.len(),
            "records_parsed": self.records_parsed,
            "registered": self.registered,
            "failures": failures,
        })
    }
}

struct ProducerOutcome {
    summary: FileSummary,
    failure: Option<ImportFailure>,
}

#[derive(Default)]
struct ConsumerOutcome {
    registered: usize,
    failures: Vec<ImportFailure>,
}

pub struct ImportCoordinator<S: RecordSource + 'static> {
    registry: Arc<Registry>,
    source: Arc<S>,
    config: ImportConfig,
}

impl<S: RecordSource + 'static> ImportCoordinator<S> {
    pub fn new(registry: Arc<Registry>, source: S, config: ImportConfig) -> Result<Self> {
        if config.consumers == 0 {
            return Err(PortalError::InvalidConfigValueError {
                field: "import.consumers".to_string(),
                value: "0".to_string(),
                reason: "at least one consumer is required".to_string(),
            });
        }
        if config.queue_capacity == 0 {
            return Err(PortalError::InvalidConfigValueError {
                field: "import.queue_capacity".to_string(),
                value: "0".to_string(),
                reason: "queue capacity must be at least 1".to_string(),
            });
        }
        Ok(Self {
            registry,
            source: Arc::new(source),
            config,
        })
    }

    pub fn config(&self) -> ImportConfig {
        self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 匯入所有檔案。單一檔案或單筆記錄的錯誤寫進報告，不會中止整批匯入；
    /// 只有 worker panic 才回傳 `Err`。
    pub async fn run(&self, filenames: &[String]) -> Result<ImportReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            files = filenames.len(),
            consumers = self.config.consumers,
            queue_capacity = self.config.queue_capacity,
            "📥 Starting student import"
        );

        let (tx, rx) = mpsc::channel::<QueuedRecord>(self.config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        // Fan-out: 每個檔案一個 producer
        let producers: Vec<JoinHandle<ProducerOutcome>> = filenames
            .iter()
            .map(|filename| {
                let source = Arc::clone(&self.source);
                let tx = tx.clone();
                let filename: Arc<str> = Arc::from(filename.as_str());
                tokio::spawn(produce(source, filename, tx))
            })
            .collect();

        // Supervisor 持有最後一個 sender，等所有 producer 結束後才關閉佇列
        let supervisor = tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(producers.len());
            let mut join_error = None;
            for producer in producers {
                match producer.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        error!(error = %e, "Producer task failed");
                        if join_error.is_none() {
                            join_error = Some(e);
                        }
                    }
                }
            }
            drop(tx);
            debug!("All producers finished, queue closed");
            (outcomes, join_error)
        });

        // Fan-in: 固定數量的 consumer
        let consumers: Vec<JoinHandle<ConsumerOutcome>> = (0..self.config.consumers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let registry = Arc::clone(&self.registry);
                tokio::spawn(consume(worker, rx, registry))
            })
            .collect();
        // consumer 全數結束時 receiver 隨之釋放，producer 的 send 才不會永遠卡住
        drop(rx);

        let (producer_outcomes, producer_join_error) = supervisor.await?;

        let mut registered = 0;
        let mut failures = Vec::new();
        let mut consumer_join_error = None;
        for consumer in consumers {
            match consumer.await {
                Ok(outcome) => {
                    registered += outcome.registered;
                    failures.extend(outcome.failures);
                }
                Err(e) => {
                    error!(error = %e, "Consumer task failed");
                    if consumer_join_error.is_none() {
                        consumer_join_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = producer_join_error.or(consumer_join_error) {
            return Err(PortalError::TaskJoinError(e));
        }

        let mut files = Vec::with_capacity(producer_outcomes.len());
        let mut file_failures = Vec::new();
        for outcome in producer_outcomes {
            files.push(outcome.summary);
            file_failures.extend(outcome.failure);
        }
        file_failures.extend(failures);
        let failures = file_failures;

        let records_parsed = files.iter().map(|f| f.parsed).sum();
        let report = ImportReport {
            started_at,
            finished_at: Utc::now(),
            duration: start.elapsed(),
            files,
            records_parsed,
            registered,
            failures,
        };

        info!(
            parsed = report.records_parsed,
            registered = report.registered,
            failures = report.failures.len(),
            duration = ?report.duration,
            "✅ Student import finished"
        );

        Ok(report)
    }
}

async fn produce<S: RecordSource>(
    source: Arc<S>,
    filename: Arc<str>,
    tx: mpsc::Sender<QueuedRecord>,
) -> ProducerOutcome {
    let records = match source.parse_records(&filename).await {
        Ok(records) => records,
        Err(error) => {
            if error.is_record_level() {
                warn!(file = %filename, error = %error, "⚠️ Skipping unreadable source");
            } else {
                error!(file = %filename, error = %error, "❌ Unexpected error while reading source");
            }
            return ProducerOutcome {
                summary: FileSummary {
                    source: filename.to_string(),
                    parsed: 0,
                    failed: true,
                },
                failure: Some(ImportFailure {
                    source: filename.to_string(),
                    record_id: None,
                    error,
                }),
            };
        }
    };

    let parsed = records.len();
    debug!(file = %filename, records = parsed, "Queueing parsed records");

    for record in records {
        let queued = QueuedRecord {
            source: Arc::clone(&filename),
            record,
        };
        // 只有所有 consumer 都已結束時 send 才會失敗
        if tx.send(queued).await.is_err() {
            warn!(file = %filename, "Import queue closed before all records were sent");
            break;
        }
    }

    ProducerOutcome {
        summary: FileSummary {
            source: filename.to_string(),
            parsed,
            failed: false,
        },
        failure: None,
    }
}

async fn consume(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedRecord>>>,
    registry: Arc<Registry>,
) -> ConsumerOutcome {
    let mut outcome = ConsumerOutcome::default();

    loop {
        let next = { rx.lock().await.recv().await };
        let Some(QueuedRecord { source, record }) = next else {
            break;
        };

        match registry.register(&record.id, &record.name, &record.program_code) {
            Ok(_) => {
                outcome.registered += 1;
            }
            Err(error) => {
                if error.is_record_level() {
                    warn!(
                        worker,
                        file = %source,
                        id = %record.id,
                        error = %error,
                        "Record rejected"
                    );
                } else {
                    error!(
                        worker,
                        file = %source,
                        id = %record.id,
                        error = %error,
                        "❌ Unexpected error while registering record"
                    );
                }
                outcome.failures.push(ImportFailure {
                    source: source.to_string(),
                    record_id: Some(record.id),
                    error,
                });
            }
        }
    }

    debug!(worker, registered = outcome.registered, "Consumer drained queue");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::StudyProgramCatalog;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockSource {
        files: HashMap<String, Vec<ImportRecord>>,
    }

    impl MockSource {
        fn with_file(mut self, name: &str, records: Vec<ImportRecord>) -> Self {
            self.files.insert(name.to_string(), records);
            self
        }
    }

    #[async_trait::async_trait]
    impl RecordSource for MockSource {
        async fn parse_records(&self, path: &str) -> Result<Vec<ImportRecord>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| PortalError::SourceUnreadable {
                    path: path.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                })
        }
    }

    fn coordinator(source: MockSource, config: ImportConfig) -> ImportCoordinator<MockSource> {
        let registry = Arc::new(Registry::with_catalog(StudyProgramCatalog::default()));
        ImportCoordinator::new(registry, source, config).unwrap()
    }

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_import_with_no_files() {
        let coordinator = coordinator(MockSource::default(), ImportConfig::default());
        let report = coordinator.run(&[]).await.unwrap();

        assert_eq!(report.registered, 0);
        assert!(report.failures.is_empty());
        assert!(coordinator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_does_not_stop_others() {
        let source = MockSource::default().with_file(
            "f1",
            vec![
                ImportRecord::new("A1", "Bob", "TI"),
                ImportRecord::new("A2", "Dee", "TK"),
            ],
        );
        let coordinator = coordinator(source, ImportConfig::default());

        let report = coordinator.run(&files(&["f1", "missing"])).await.unwrap();

        assert_eq!(report.registered, 2);
        assert_eq!(report.file_failures().count(), 1);
        assert_eq!(report.failures_in(ErrorCategory::Source), 1);
        assert!(report.files.iter().any(|f| f.source == "missing" && f.failed));
        assert_eq!(coordinator.registry().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_capacity_one_does_not_deadlock() {
        let records: Vec<ImportRecord> = (0..500)
            .map(|i| ImportRecord::new(format!("S{}", i), format!("Student {}", i), "SI"))
            .collect();
        let source = MockSource::default().with_file("big", records);
        let coordinator = coordinator(
            source,
            ImportConfig {
                queue_capacity: 1,
                consumers: 1,
            },
        );

        let report = coordinator.run(&files(&["big"])).await.unwrap();

        assert_eq!(report.records_parsed, 500);
        assert_eq!(report.registered, 500);
        assert_eq!(coordinator.registry().len(), 500);
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let registry = Arc::new(Registry::default());

        let err = ImportCoordinator::new(
            Arc::clone(&registry),
            MockSource::default(),
            ImportConfig {
                queue_capacity: 10,
                consumers: 0,
            },
        )
        .err()
        .unwrap();
        assert_eq!(err.category(), ErrorCategory::Config);

        let err = ImportCoordinator::new(
            registry,
            MockSource::default(),
            ImportConfig {
                queue_capacity: 0,
                consumers: 2,
            },
        )
        .err()
        .unwrap();
        assert!(
            matches!(err, PortalError::InvalidConfigValueError { ref field, .. } if field == "import.queue_capacity")
        );
    }

    /// I/O 等非資料錯誤仍只影響該檔案，但在報告中另外標出
    #[tokio::test]
    async fn test_unexpected_source_error_is_reported_separately() {
        struct FlakySource;

        #[async_trait::async_trait]
        impl RecordSource for FlakySource {
            async fn parse_records(&self, path: &str) -> Result<Vec<ImportRecord>> {
                match path {
                    "ok" => Ok(vec![ImportRecord::new("A1", "Bob", "TI")]),
                    "malformed" => Err(PortalError::SourceMalformed {
                        path: path.to_string(),
                        line: 1,
                        reason: "expected 3 fields, found 1".to_string(),
                    }),
                    _ => Err(PortalError::IoError(std::io::Error::other("disk failure"))),
                }
            }
        }

        let registry = Arc::new(Registry::default());
        let coordinator =
            ImportCoordinator::new(Arc::clone(&registry), FlakySource, ImportConfig::default())
                .unwrap();
        let report = coordinator
            .run(&files(&["ok", "malformed", "broken"]))
            .await
            .unwrap();

        assert_eq!(report.registered, 1);
        assert_eq!(report.file_failures().count(), 2);
        let unexpected: Vec<_> = report.unexpected_failures().collect();
        assert_eq!(unexpected.len(), 1);
        assert_eq!(unexpected[0].source, "broken");
        assert_eq!(unexpected[0].error.category(), ErrorCategory::Internal);
    }

    #[tokio::test]
    async fn test_summary_json() {
        let source = MockSource::default().with_file(
            "f1",
            vec![
                ImportRecord::new("A1", "Bob", "TI"),
                ImportRecord::new("A3", "Finn", "ZZ"),
            ],
        );
        let coordinator = coordinator(source, ImportConfig::default());
        let report = coordinator.run(&files(&["f1"])).await.unwrap();

        let summary = report.summary_json();
        assert_eq!(summary["registered"], 1);
        assert_eq!(summary["records_parsed"], 2);
        assert_eq!(summary["failures"][0]["record_id"], "A3");
        assert_eq!(summary["failures"][0]["category"], "validation");
    }
}
