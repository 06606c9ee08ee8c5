//! Debug artifacts: the enriched markup and plain text of a run, written to
//! timestamped files for inspection.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, instrument, warn};

use wikireq_shared::{Result, WikiReqError};

/// Timestamp format used in artifact file names.
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub enriched_markup: PathBuf,
    pub plain_text: PathBuf,
}

/// Writes `enriched_page_{stamp}.html` and `plain_text_{stamp}.txt`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write both artifacts stamped with `at`.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn write(
        &self,
        enriched_markup: &str,
        plain_text: &str,
        at: DateTime<Local>,
    ) -> Result<WrittenArtifacts> {
        std::fs::create_dir_all(&self.dir).map_err(|e| WikiReqError::io(&self.dir, e))?;

        let (html_name, text_name) = artifact_file_names(at);
        let written = WrittenArtifacts {
            enriched_markup: self.dir.join(html_name),
            plain_text: self.dir.join(text_name),
        };

        write_file(&written.enriched_markup, enriched_markup)?;
        write_file(&written.plain_text, plain_text)?;

        info!(
            enriched = %written.enriched_markup.display(),
            plain_text = %written.plain_text.display(),
            "debug artifacts written"
        );
        Ok(written)
    }

    /// Like [`write`](Self::write) with the current local time; failures are
    /// logged and swallowed.
    pub fn write_or_log(&self, enriched_markup: &str, plain_text: &str) -> Option<WrittenArtifacts> {
        match self.write(enriched_markup, plain_text, Local::now()) {
            Ok(written) => Some(written),
            Err(e) => {
                warn!(error = %e, "failed to write debug artifacts");
                None
            }
        }
    }
}

/// File names for artifacts stamped with `at`.
pub fn artifact_file_names(at: DateTime<Local>) -> (String, String) {
    let stamp = at.format(STAMP_FORMAT);
    (
        format!("enriched_page_{stamp}.html"),
        format!("plain_text_{stamp}.txt"),
    )
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| WikiReqError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wikireq-artifacts-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn file_names_are_timestamped() {
        let (html, text) = artifact_file_names(fixed_time());
        assert_eq!(html, "enriched_page_20240307_090502.html");
        assert_eq!(text, "plain_text_20240307_090502.txt");
    }

    #[test]
    fn writes_both_files() {
        let tmp = temp_dir();
        let writer = ArtifactWriter::new(tmp.join("out"));

        let written = writer
            .write("<p>BR-1 <span>(Catalog)</span></p>", "BR-1 (Catalog)", fixed_time())
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&written.enriched_markup).unwrap(),
            "<p>BR-1 <span>(Catalog)</span></p>"
        );
        assert_eq!(std::fs::read_to_string(&written.plain_text).unwrap(), "BR-1 (Catalog)");
        assert!(written.plain_text.starts_with(tmp.join("out")));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unwritable_dir_is_logged_not_fatal() {
        let tmp = temp_dir();
        let blocker = tmp.join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let writer = ArtifactWriter::new(blocker.join("nested"));
        assert!(writer.write_or_log("<p/>", "").is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
