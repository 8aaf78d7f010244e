//! End-to-end `analyze` pipeline: load table → per row normalize, fetch,
//! classify, merge → persist snapshot.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use joblens_classifier::{JobClassifier, LlmClassifier};
use joblens_fetcher::{ContentFetcher, LinkNormalizer, renderer_from_config};
use joblens_shared::{
    AppConfig, Classification, ClassifierConfig, FetcherConfig, Result, RunId, StoreConfig,
};
use joblens_storage::{FsWriter, SnapshotWriter, TableStore, load_table};

use crate::merge::{RunStamp, merge_row};

/// Format of the `Date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appended to page text cut at the character budget.
pub const TRUNCATION_MARKER: &str = "\n[content truncated]";

/// Lifecycle of one row within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStage {
    Pending,
    Normalizing,
    Fetching,
    Classifying,
    Merged,
    Persisted,
}

impl RowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Normalizing => "normalizing",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Merged => "merged",
            Self::Persisted => "persisted",
        }
    }
}

impl fmt::Display for RowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one `analyze` run.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    /// Table to read.
    pub input: PathBuf,
    /// Where snapshots are written. May equal `input`.
    pub output: PathBuf,
    /// Pause between rows.
    pub pacing: Duration,
    /// Character budget for page text sent to the classifier (0 = unlimited).
    pub max_content_chars: usize,
    /// Persist after this many rows (and always after the last one).
    pub persist_every: usize,
    /// `Status` written to rows that have none.
    pub status_marker: String,
    /// Value of the `Date` column; `None` stamps the moment `analyze` starts.
    pub started_at: Option<DateTime<Utc>>,
}

impl AnalyzeConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            pacing: Duration::from_millis(config.defaults.pacing_ms),
            max_content_chars: config.defaults.max_content_chars,
            persist_every: config.defaults.persist_every.max(1),
            status_marker: config.defaults.status_marker.clone(),
            started_at: None,
        }
    }
}

/// Result of an `analyze` run.
#[derive(Debug)]
pub struct AnalyzeResult {
    pub run_id: RunId,
    /// Path of the persisted table.
    pub output: PathBuf,
    pub rows: usize,
    /// Rows sent to the classifier.
    pub classified: usize,
    /// Rows without a link.
    pub skipped: usize,
    /// Rows whose page produced no text.
    pub degraded: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the table is loaded.
    fn started(&self, total_rows: usize);
    /// Called on every row stage transition.
    fn row_stage(&self, index: usize, total: usize, title: &str, stage: RowStage);
    /// Called when the pipeline completes.
    fn done(&self, result: &AnalyzeResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total_rows: usize) {}
    fn row_stage(&self, _index: usize, _total: usize, _title: &str, _stage: RowStage) {}
    fn done(&self, _result: &AnalyzeResult) {}
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// The per-row collaborators of a run.
pub struct Analyzer<W = FsWriter> {
    normalizer: LinkNormalizer,
    fetcher: ContentFetcher,
    classifier: Arc<dyn JobClassifier>,
    store: TableStore<W>,
}

impl Analyzer<FsWriter> {
    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &AppConfig, api_key: Option<String>) -> Result<Self> {
        let fetcher_config = FetcherConfig::from(config);
        let renderer = renderer_from_config(&fetcher_config)?;
        let classifier = LlmClassifier::new(ClassifierConfig::from(config), api_key)?;

        Ok(Self::new(
            LinkNormalizer::from(&fetcher_config),
            ContentFetcher::new(renderer),
            Arc::new(classifier),
            TableStore::new(StoreConfig::from(config)),
        ))
    }
}

impl<W: SnapshotWriter> Analyzer<W> {
    pub fn new(
        normalizer: LinkNormalizer,
        fetcher: ContentFetcher,
        classifier: Arc<dyn JobClassifier>,
        store: TableStore<W>,
    ) -> Self {
        Self {
            normalizer,
            fetcher,
            classifier,
            store,
        }
    }

    /// Run the `analyze` pipeline.
    ///
    /// Fetch and classification failures only degrade a row. The run stops
    /// early only when the table cannot be loaded or a snapshot cannot be
    /// persisted; rows persisted before that stay on disk.
    #[instrument(skip_all, fields(input = %config.input.display(), output = %config.output.display()))]
    pub async fn analyze(
        &self,
        config: &AnalyzeConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalyzeResult> {
        let start = Instant::now();
        let started_at = config.started_at.unwrap_or_else(Utc::now);
        let run_id = RunId::new();

        let mut table = load_table(&config.input)?;
        let total = table.len();
        progress.started(total);
        info!(%run_id, rows = total, "starting analyze pipeline");

        let stamp = RunStamp {
            date: started_at.format(DATE_FORMAT).to_string(),
            status_marker: config.status_marker.clone(),
        };
        let persist_every = config.persist_every.max(1);

        let mut classified = 0;
        let mut skipped = 0;
        let mut degraded = 0;

        for index in 0..total {
            let source = table.rows()[index].clone();
            let title = source.title().to_string();
            let enter = |stage: RowStage| {
                debug!(row = index, %stage, "row stage");
                progress.row_stage(index, total, &title, stage);
            };
            enter(RowStage::Pending);

            let raw_link = source.link();
            let (link, classification) = if raw_link.is_empty() {
                skipped += 1;
                debug!(row = index, "no link, skipping fetch and classification");
                (String::new(), Classification::default())
            } else {
                enter(RowStage::Normalizing);
                let link = self.normalizer.normalize(raw_link);

                enter(RowStage::Fetching);
                let text = self.fetcher.fetch(&link).await;
                if text.is_empty() {
                    degraded += 1;
                }
                let text = truncate_chars(&text, config.max_content_chars);

                enter(RowStage::Classifying);
                let classification = self.classifier.classify(&title, &text).await;
                classified += 1;
                (link, classification)
            };

            table.rows_mut()[index] = merge_row(&source, &link, &classification, &stamp);
            enter(RowStage::Merged);

            let is_last = index + 1 == total;
            if is_last || (index + 1) % persist_every == 0 {
                self.store.save(&config.output, &table).await?;
                enter(RowStage::Persisted);
            }

            if !is_last && !config.pacing.is_zero() {
                tokio::time::sleep(config.pacing).await;
            }
        }

        if total == 0 {
            self.store.save(&config.output, &table).await?;
        }

        let result = AnalyzeResult {
            run_id,
            output: config.output.clone(),
            rows: total,
            classified,
            skipped,
            degraded,
            elapsed: start.elapsed(),
        };

        info!(
            rows = result.rows,
            classified = result.classified,
            skipped = result.skipped,
            degraded = result.degraded,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "analyze pipeline complete"
        );

        progress.done(&result);
        Ok(result)
    }
}

/// Default output location for `input`: `<dir>/<stem>-analysis.csv`.
pub fn default_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jobs".into());
    output_dir.join(format!("{stem}-analysis.csv"))
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use joblens_fetcher::PageRenderer;
    use joblens_shared::{
        Backoff, Industry, JobLensError, Level, RemoteMode, RetryPolicy, SalaryBand,
    };
    use joblens_storage::Table;

    use super::*;
    use crate::merge::*;

    // -- Stubs ---------------------------------------------------------------

    struct StubRenderer {
        calls: AtomicUsize,
        text: &'static str,
    }

    #[async_trait]
    impl PageRenderer for StubRenderer {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn render_text(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    struct StubClassifier {
        calls: Mutex<Vec<(String, String)>>,
        reply: Classification,
    }

    #[async_trait]
    impl JobClassifier for StubClassifier {
        async fn classify(&self, title: &str, text: &str) -> Classification {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), text.to_string()));
            self.reply.clone()
        }
    }

    /// Writes the first `allowed` snapshots, then reports the file as locked.
    struct LockedAfter {
        allowed: usize,
        writes: AtomicUsize,
    }

    impl SnapshotWriter for LockedAfter {
        fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) < self.allowed {
                FsWriter.write(path, bytes)
            } else {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }
    }

    fn scenario_classification() -> Classification {
        Classification {
            remote: RemoteMode::Remote,
            best_stack: Some("Backend"),
            all_possible_stacks: vec!["Backend"],
            has_special_phrase: false,
            matched_special_phrases: Vec::new(),
            industry: Industry::NotApplicable,
            annual_salary: SalaryBand::Over100K,
            level: Level::Senior,
        }
    }

    struct Harness<W: SnapshotWriter> {
        analyzer: Analyzer<W>,
        renderer: Arc<StubRenderer>,
        classifier: Arc<StubClassifier>,
        dir: PathBuf,
    }

    impl<W: SnapshotWriter> Harness<W> {
        fn config(&self, input: &str, output: &str) -> AnalyzeConfig {
            AnalyzeConfig {
                input: self.dir.join(input),
                output: self.dir.join(output),
                pacing: Duration::ZERO,
                max_content_chars: 40,
                persist_every: 1,
                status_marker: "Not Applied".into(),
                started_at: Some(
                    DateTime::parse_from_rfc3339("2024-05-01T09:30:00Z")
                        .unwrap()
                        .with_timezone(&Utc),
                ),
            }
        }

        fn write_input(&self, name: &str, csv: &str) {
            std::fs::write(self.dir.join(name), csv).unwrap();
        }

        fn cleanup(&self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn harness_with<W: SnapshotWriter>(writer: W, page_text: &'static str) -> Harness<W> {
        let dir = std::env::temp_dir().join(format!("jl-core-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let renderer = Arc::new(StubRenderer {
            calls: AtomicUsize::new(0),
            text: page_text,
        });
        let classifier = Arc::new(StubClassifier {
            calls: Mutex::new(Vec::new()),
            reply: scenario_classification(),
        });
        let store = TableStore::with_writer(
            StoreConfig {
                retry: RetryPolicy::new(
                    2,
                    Backoff::Linear {
                        step: Duration::from_millis(1),
                    },
                ),
            },
            writer,
        );
        let analyzer = Analyzer::new(
            LinkNormalizer::new(vec!["applytojob.com".into()]),
            ContentFetcher::new(renderer.clone()).allow_private_hosts(),
            classifier.clone(),
            store,
        );

        Harness {
            analyzer,
            renderer,
            classifier,
            dir,
        }
    }

    fn harness(page_text: &'static str) -> Harness<FsWriter> {
        harness_with(FsWriter, page_text)
    }

    fn load(path: &Path) -> Table {
        load_table(path).unwrap()
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn scenario_row_is_flattened_with_status_marker() {
        let h = harness("Backend Engineer, remote, $120k");
        h.write_input("jobs.csv", "Title,Link\nBackend Engineer,https://x.com/job/1\n");

        let result = h
            .analyzer
            .analyze(&h.config("jobs.csv", "out.csv"), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.rows, 1);
        assert_eq!(result.classified, 1);
        assert_eq!(result.skipped, 0);

        let out = load(&result.output);
        assert_eq!(out.len(), 1);
        let row = &out.rows()[0];
        assert_eq!(row.get(DATE_COLUMN), Some("2024-05-01 09:30:00"));
        assert_eq!(row.get(STATUS_COLUMN), Some("Not Applied"));
        assert_eq!(row.link(), "https://x.com/job/1");
        assert_eq!(row.get(REMOTE_COLUMN), Some("Remote"));
        assert_eq!(row.get(BEST_STACK_COLUMN), Some("Backend"));
        assert_eq!(row.get(ALL_STACKS_COLUMN), Some("Backend"));
        assert_eq!(row.get(SECRET_REQUIRED_COLUMN), Some("No"));
        assert_eq!(row.get(PHRASES_COLUMN), Some(""));
        assert_eq!(row.get(INDUSTRY_COLUMN), Some("N/A"));
        assert_eq!(row.get(SALARY_COLUMN), Some("100K <"));
        assert_eq!(row.get(LEVEL_COLUMN), Some("Senior"));

        let calls = h.classifier.calls.lock().unwrap().clone();
        assert_eq!(calls, [("Backend Engineer".to_string(), "Backend Engineer, remote, $120k".to_string())]);

        h.cleanup();
    }

    #[tokio::test]
    async fn row_count_is_preserved_and_empty_links_are_not_fetched() {
        let h = harness("page");
        h.write_input(
            "jobs.csv",
            "Title,Link,Company\n\
             A,https://x.com/job/1/apply,Acme\n\
             B,,Beta\n\
             C,https://boards.applytojob.com/c/9/apply?ref=x,Gamma\n",
        );

        let result = h
            .analyzer
            .analyze(&h.config("jobs.csv", "out.csv"), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.rows, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.classified, 2);
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 2);
        let titles: Vec<String> = h
            .classifier
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect();
        assert_eq!(titles, ["A", "C"]);

        let out = load(&result.output);
        assert_eq!(out.len(), 3);
        assert_eq!(out.rows()[0].link(), "https://x.com/job/1");
        assert_eq!(out.rows()[1].link(), "");
        assert_eq!(out.rows()[1].get(LEVEL_COLUMN), Some("N/A"));
        assert_eq!(out.rows()[1].get(STATUS_COLUMN), Some("Not Applied"));
        assert_eq!(out.rows()[2].link(), "https://boards.applytojob.com/c/9");
        assert_eq!(out.rows()[2].get("Company"), Some("Gamma"));

        assert_eq!(
            out.header(),
            [
                "Title",
                "Link",
                "Company",
                "Date",
                "Status",
                "Remote",
                "BestStack",
                "AllPossibleStacks",
                "SecretRequired",
                "GovernanceAndSecurityPhrases",
                "Industry",
                "AnnualSalary",
                "Level",
            ]
        );

        h.cleanup();
    }

    #[tokio::test]
    async fn in_place_rewrite_keeps_blank_records_and_extra_cells() {
        let h = harness("page");
        h.write_input(
            "jobs.csv",
            "Title,Link,Company\n\
             A,https://x.com/job/1,Acme,referral\n\
             ,,\n\
             B,,Beta\n\
             C,https://x.com/job/3,Gamma\n",
        );

        let config = h.config("jobs.csv", "jobs.csv");
        let result = h.analyzer.analyze(&config, &SilentProgress).await.unwrap();

        assert_eq!(result.rows, 4);
        assert_eq!(result.skipped, 2);
        assert_eq!(h.classifier.calls.lock().unwrap().len(), 2);

        let out = load(&config.input);
        assert_eq!(out.len(), 4);
        assert_eq!(&out.header()[..4], ["Title", "Link", "Company", "Column 4"]);
        assert_eq!(out.rows()[0].get("Company"), Some("Acme"));
        assert_eq!(out.rows()[0].get("Column 4"), Some("referral"));

        let blank = &out.rows()[1];
        assert_eq!(blank.title(), "");
        assert_eq!(blank.link(), "");
        assert_eq!(blank.get(REMOTE_COLUMN), Some("N/A"));
        assert_eq!(blank.get(LEVEL_COLUMN), Some("N/A"));
        assert_eq!(blank.get(STATUS_COLUMN), Some("Not Applied"));

        assert_eq!(out.rows()[2].get("Company"), Some("Beta"));
        assert_eq!(out.rows()[3].get(LEVEL_COLUMN), Some("Senior"));

        h.cleanup();
    }

    #[tokio::test]
    async fn date_defaults_to_run_start() {
        let h = harness("page");
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/job/1\n");

        let mut config = h.config("jobs.csv", "out.csv");
        config.started_at = None;

        let before = Utc::now().format(DATE_FORMAT).to_string();
        h.analyzer.analyze(&config, &SilentProgress).await.unwrap();
        let after = Utc::now().format(DATE_FORMAT).to_string();

        let out = load(&config.output);
        let date = out.rows()[0].get(DATE_COLUMN).unwrap();
        assert!(before.as_str() <= date && date <= after.as_str(), "{date}");

        h.cleanup();
    }

    #[tokio::test]
    async fn rerun_on_own_output_is_stable() {
        let h = harness("page");
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/job/1/apply/step1\nB,https://x.com/job/2\n");

        let config = h.config("jobs.csv", "out.csv");
        h.analyzer.analyze(&config, &SilentProgress).await.unwrap();
        let first = load(&config.output);

        let rerun = h.config("out.csv", "out.csv");
        h.analyzer.analyze(&rerun, &SilentProgress).await.unwrap();
        let second = load(&rerun.output);

        assert_eq!(first, second);

        h.cleanup();
    }

    #[tokio::test]
    async fn page_text_is_truncated_before_classification() {
        let h = harness("ééééééééééééééééééééééééééééééééééééééééééééééééééé");
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/job/1\n");

        let result = h
            .analyzer
            .analyze(&h.config("jobs.csv", "out.csv"), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.degraded, 0);

        let calls = h.classifier.calls.lock().unwrap().clone();
        let text = &calls[0].1;
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.trim_end_matches(TRUNCATION_MARKER).chars().count(), 40);

        h.cleanup();
    }

    #[tokio::test]
    async fn empty_page_text_counts_as_degraded() {
        let h = harness("");
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/job/1\n");

        let result = h
            .analyzer
            .analyze(&h.config("jobs.csv", "out.csv"), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.degraded, 1);
        assert_eq!(result.classified, 1);

        h.cleanup();
    }

    #[tokio::test]
    async fn busy_output_aborts_and_keeps_persisted_rows() {
        let h = harness_with(
            LockedAfter {
                allowed: 1,
                writes: AtomicUsize::new(0),
            },
            "page",
        );
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/job/1\nB,https://x.com/job/2\n");

        let config = h.config("jobs.csv", "out.csv");
        let err = h.analyzer.analyze(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, JobLensError::ResourceBusy { attempts: 2, .. }));

        let out = load(&config.output);
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows()[0].get(LEVEL_COLUMN), Some("Senior"));
        assert_eq!(out.rows()[1].get(LEVEL_COLUMN), Some(""));

        h.cleanup();
    }

    #[tokio::test]
    async fn missing_link_column_fails_before_any_work() {
        let h = harness("page");
        h.write_input("jobs.csv", "Title,Url\nA,https://x.com/job/1\n");

        let err = h
            .analyzer
            .analyze(&h.config("jobs.csv", "out.csv"), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, JobLensError::MissingColumn { .. }));
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(!h.dir.join("out.csv").exists());

        h.cleanup();
    }

    #[tokio::test]
    async fn batched_persistence_still_writes_every_row() {
        let h = harness("page");
        h.write_input("jobs.csv", "Title,Link\nA,https://x.com/1\nB,https://x.com/2\nC,https://x.com/3\n");

        let mut config = h.config("jobs.csv", "out.csv");
        config.persist_every = 2;
        h.analyzer.analyze(&config, &SilentProgress).await.unwrap();

        let out = load(&config.output);
        assert!(out.rows().iter().all(|r| r.get(LEVEL_COLUMN) == Some("Senior")));

        h.cleanup();
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), format!("hé{TRUNCATION_MARKER}"));
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("héllo", 0), "héllo");
    }

    #[test]
    fn default_output_path_uses_input_stem() {
        assert_eq!(
            default_output_path(Path::new("input/acme.csv"), Path::new("output")),
            PathBuf::from("output/acme-analysis.csv")
        );
    }
}
