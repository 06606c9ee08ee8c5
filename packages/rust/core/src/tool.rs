//! Agent-facing page loader tool.
//!
//! Wraps [`Pipeline::run_url`] in the string-in, string-out contract agent
//! loops expect. The tool never fails: every problem is reported as text.

use tracing::{info, instrument, warn};

use crate::pipeline::{Pipeline, ProgressReporter, SilentProgress};

/// Tool name advertised to agents.
pub const TOOL_NAME: &str = "confluence_loader";

/// Tool description advertised to agents.
pub const TOOL_DESCRIPTION: &str = "Loads and extracts business requirements from a Confluence Wiki page URL. \
     Input should be the full Confluence Wiki URL. \
     Returns the page content with all requirement definitions enriched and ready for analysis.";

const NO_URL_MESSAGE: &str = "Error: No URL provided. Please provide a valid Confluence Wiki URL.";

/// Loads a wiki page by URL and returns its enriched plain text.
#[derive(Debug, Clone)]
pub struct PageLoaderTool {
    pipeline: Pipeline,
}

impl PageLoaderTool {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// Run the tool on raw agent input.
    pub async fn call(&self, input: &str) -> String {
        self.call_with_progress(input, &SilentProgress).await
    }

    #[instrument(skip_all, fields(tool = TOOL_NAME))]
    pub async fn call_with_progress(&self, input: &str, progress: &dyn ProgressReporter) -> String {
        let url = input.trim();
        if url.is_empty() {
            warn!("tool called without a URL");
            return NO_URL_MESSAGE.to_string();
        }

        match self.pipeline.run_url(url, progress).await {
            Ok(output) => {
                info!(chars = output.text.len(), "tool produced page context");
                format_page_context(&output.text)
            }
            Err(e) => {
                warn!(%url, error = %e, "tool failed");
                format_tool_error(&e.to_string())
            }
        }
    }
}

/// Frame page text for an agent.
pub fn format_page_context(text: &str) -> String {
    format!("# Wiki Page Information\n## Full Page Content\n{text}")
}

/// Frame a failure for an agent.
pub fn format_tool_error(message: &str) -> String {
    format!(
        "Error loading Wiki page: {message}\n\nPlease ensure the URL is a valid Confluence page URL with proper authentication."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikireq_shared::AppConfig;

    fn tool() -> PageLoaderTool {
        PageLoaderTool::new(Pipeline::new(&AppConfig::default()))
    }

    #[test]
    fn advertises_name() {
        assert_eq!(tool().name(), "confluence_loader");
        assert!(tool().description().contains("Confluence Wiki page URL"));
    }

    #[tokio::test]
    async fn empty_input() {
        assert_eq!(tool().call("   \n").await, NO_URL_MESSAGE);
    }

    #[tokio::test]
    async fn unsupported_url_is_reported_as_text() {
        let out = tool().call("https://wiki.example.com/display/BJS/Title").await;
        assert!(out.starts_with("Error loading Wiki page: unsupported page URL"));
        assert!(out.ends_with("with proper authentication."));
    }

    #[tokio::test]
    async fn unreachable_page_still_formats_context() {
        // No Confluence server configured: the run degrades to empty text.
        let out = tool().call("https://wiki.example.com/spaces/BJS/pages/1/Title").await;
        assert_eq!(out, "# Wiki Page Information\n## Full Page Content\n");
    }

    #[test]
    fn context_framing() {
        assert_eq!(
            format_page_context("BR-1 (Catalog A: text)"),
            "# Wiki Page Information\n## Full Page Content\nBR-1 (Catalog A: text)"
        );
    }
}
