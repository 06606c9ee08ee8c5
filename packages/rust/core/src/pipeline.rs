//! End-to-end enrichment pipeline: page → index → enrich → linearize → text.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use wikireq_confluence::{ConfluenceClient, IndexStats, PageRef, RetryPolicy, load_index_file};
use wikireq_markup::{EnrichOptions, EnrichReport, EnrichedDocument, linearize_document};
use wikireq_shared::{AppConfig, RawDocument, RequirementIndex, Result, WikiReqError};

use crate::artifacts::{ArtifactWriter, WrittenArtifacts};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where page markup comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Storage-format body from the content REST endpoint.
    Remote(PageRef),
    /// A local markup file.
    File(PathBuf),
}

/// Where the requirements index comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    /// The requirements REST endpoint for the page.
    Remote(PageRef),
    /// A local JSON export.
    File(PathBuf),
    /// No index; every marker stays unresolved.
    None,
}

impl fmt::Display for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(page) => write!(f, "page {page}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl fmt::Display for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(page) => write!(f, "requirements of page {page}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::None => f.write_str("no index"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output & progress
// ---------------------------------------------------------------------------

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    /// Linearized, prompt-ready text.
    pub text: String,
    /// The enriched tree serialized back to markup.
    pub enriched_markup: String,
    pub report: EnrichReport,
    /// Records in the requirements index that was used.
    pub index_len: usize,
    /// Recovered failures and unresolved references, in the order they occurred.
    pub diagnostics: Vec<String>,
    pub artifacts: Option<WrittenArtifacts>,
    pub elapsed: Duration,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the run completes.
    fn done(&self, output: &PipelineOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _output: &PipelineOutput) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The requirement enrichment pipeline.
///
/// Built once from config and reused across runs; holds no per-run state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: Option<ConfluenceClient>,
    enrich_options: EnrichOptions,
    default_space: String,
    fetch_deadline: Option<Duration>,
    artifacts: Option<ArtifactWriter>,
}

impl Pipeline {
    /// An offline pipeline: local sources only until a client is attached.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: None,
            enrich_options: EnrichOptions {
                excerpt_limit: config.enrichment.excerpt_limit,
            },
            default_space: config.confluence.default_space.clone(),
            fetch_deadline: None,
            artifacts: config
                .output
                .debug_artifacts
                .then(|| ArtifactWriter::new(&config.output.artifacts_dir)),
        }
    }

    /// A pipeline with a Confluence client built from `[confluence]` and `[retry]`.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let client = ConfluenceClient::new(&config.confluence, RetryPolicy::from(&config.retry))?;
        Ok(Self::new(config).with_client(client))
    }

    pub fn with_client(mut self, client: ConfluenceClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Bound each fetch (page and index) by `deadline`. Parsing and
    /// transformation are not affected.
    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = Some(deadline);
        self
    }

    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    /// Decompose a page URL, inferring the space from config when needed.
    pub fn parse_url(&self, url: &str) -> Result<PageRef> {
        PageRef::parse(url, &self.default_space)
    }

    /// Obtain page markup. Fails with [`WikiReqError::SourceUnavailable`]
    /// when the source cannot be reached or read.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn load(&self, source: &PageSource) -> Result<RawDocument> {
        match source {
            PageSource::Remote(page) => {
                let client = self.client("page")?;
                self.within_deadline("page", client.fetch_page_markup(page))
                    .await
            }
            PageSource::File(path) => {
                let markup = tokio::fs::read_to_string(path).await.map_err(|e| {
                    WikiReqError::unavailable(path.display().to_string(), e.to_string())
                })?;
                info!(bytes = markup.len(), "page markup read");
                Ok(RawDocument::new(markup).with_origin(path.display().to_string()))
            }
        }
    }

    /// [`load`](Self::load), degrading to an empty document on failure.
    pub async fn load_or_empty(&self, source: &PageSource) -> RawDocument {
        self.load(source).await.unwrap_or_else(|e| {
            log_degraded("page", &e);
            RawDocument::empty()
        })
    }

    /// Build the requirements index. Bad entries are skipped; an unreadable
    /// source or unparseable JSON is an error.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn load_index(&self, source: &IndexSource) -> Result<(RequirementIndex, IndexStats)> {
        match source {
            IndexSource::Remote(page) => {
                let client = self.client("requirements index")?;
                self.within_deadline("requirements index", client.fetch_index(page))
                    .await
            }
            IndexSource::File(path) => load_index_file(path, &self.default_space),
            IndexSource::None => Ok((RequirementIndex::new(), IndexStats::default())),
        }
    }

    /// [`load_index`](Self::load_index), degrading to an empty index on failure.
    pub async fn load_index_or_empty(&self, source: &IndexSource) -> RequirementIndex {
        match self.load_index(source).await {
            Ok((index, _)) => index,
            Err(e) => {
                log_degraded("requirements index", &e);
                RequirementIndex::new()
            }
        }
    }

    /// Splice definitions into the document.
    pub fn enrich(&self, raw: &RawDocument, index: &RequirementIndex) -> EnrichedDocument {
        wikireq_markup::enrich(raw, index, &self.enrich_options)
    }

    /// Flatten an enriched document to plain text.
    pub fn linearize(&self, enriched: &EnrichedDocument) -> String {
        linearize_document(&enriched.document)
    }

    /// Run the whole pipeline. Never fails: unavailable sources degrade to
    /// empty input and are recorded in [`PipelineOutput::diagnostics`].
    #[instrument(skip_all, fields(page = %page, index = %index))]
    pub async fn run(
        &self,
        page: &PageSource,
        index: &IndexSource,
        progress: &dyn ProgressReporter,
    ) -> PipelineOutput {
        let start = Instant::now();
        let run_id = Uuid::now_v7();
        let mut diagnostics = Vec::new();

        info!(%run_id, "starting enrichment run");

        // --- Phase 1: Page ---
        progress.phase("Loading page");
        let raw = match self.load(page).await {
            Ok(raw) => raw,
            Err(e) => {
                log_degraded("page", &e);
                diagnostics.push(e.to_string());
                RawDocument::empty()
            }
        };

        if raw.is_blank() {
            warn!("page is empty, skipping enrichment");
            diagnostics.push(format!("{page} has no content"));
            let output = PipelineOutput {
                run_id,
                text: String::new(),
                enriched_markup: String::new(),
                report: EnrichReport::default(),
                index_len: 0,
                diagnostics,
                artifacts: None,
                elapsed: start.elapsed(),
            };
            progress.done(&output);
            return output;
        }

        // --- Phase 2: Index ---
        progress.phase("Loading requirements index");
        let requirements = match self.load_index(index).await {
            Ok((requirements, _)) => requirements,
            Err(e) => {
                log_degraded("requirements index", &e);
                diagnostics.push(e.to_string());
                RequirementIndex::new()
            }
        };

        // --- Phase 3: Enrich ---
        progress.phase("Enriching requirement references");
        let enriched = self.enrich(&raw, &requirements);
        diagnostics.extend(enriched.report.unresolved.iter().map(|key| {
            WikiReqError::UnresolvedReference { key: key.clone() }.to_string()
        }));

        // --- Phase 4: Linearize ---
        progress.phase("Linearizing");
        let enriched_markup = enriched.to_markup();
        let text = self.linearize(&enriched);

        let artifacts = self
            .artifacts
            .as_ref()
            .and_then(|writer| writer.write_or_log(&enriched_markup, &text));

        let output = PipelineOutput {
            run_id,
            text,
            enriched_markup,
            report: enriched.report,
            index_len: requirements.len(),
            diagnostics,
            artifacts,
            elapsed: start.elapsed(),
        };

        progress.done(&output);

        info!(
            %run_id,
            markers = output.report.markers,
            annotated = output.report.annotated.len(),
            unresolved = output.report.unresolved.len(),
            chars = output.text.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "enrichment run complete"
        );

        output
    }

    /// Run against the remote API for the page at `url`.
    ///
    /// Only an unrecognized URL shape is an error.
    pub async fn run_url(&self, url: &str, progress: &dyn ProgressReporter) -> Result<PipelineOutput> {
        let page = self.parse_url(url)?;
        let output = self
            .run(
                &PageSource::Remote(page.clone()),
                &IndexSource::Remote(page),
                progress,
            )
            .await;
        Ok(output)
    }

    fn client(&self, what: &str) -> Result<&ConfluenceClient> {
        self.client
            .as_ref()
            .ok_or_else(|| WikiReqError::unavailable(what, "no Confluence server configured"))
    }

    async fn within_deadline<T>(&self, what: &str, fetch: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(deadline) = self.fetch_deadline else {
            return fetch.await;
        };

        tokio::time::timeout(deadline, fetch).await.map_err(|_| {
            WikiReqError::unavailable(
                what,
                format!("deadline of {}ms exceeded", deadline.as_millis()),
            )
        })?
    }
}

/// Log a source failure the run continues past. Errors that are not normally
/// recoverable (misconfiguration) are logged louder.
fn log_degraded(what: &str, e: &WikiReqError) {
    if e.is_recoverable() {
        warn!(what, error = %e, "source unavailable, continuing with empty input");
    } else {
        error!(what, error = %e, "source failed, continuing with empty input");
    }
}
