//! Decomposition of Confluence page URLs into page id and space key.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use wikireq_shared::{Result, WikiReqError};

/// `/spaces/{space}/pages/{id}` (the modern page URL).
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spaces/([^/?#]+)/pages/(\d+)").expect("valid regex"));

/// `?pageId={id}` (legacy `viewpage.action` URL).
static PAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]pageId=(\d+)").expect("valid regex"));

/// `/display/{space}/` (legacy pretty URL).
static DISPLAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/display/([^/?#]+)/").expect("valid regex"));

/// A page addressed by numeric id within a space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub page_id: String,
    pub space_key: String,
}

impl PageRef {
    pub fn new(page_id: impl Into<String>, space_key: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            space_key: space_key.into(),
        }
    }

    /// Decompose a page URL.
    ///
    /// Accepted shapes:
    /// - `.../spaces/{space}/pages/{id}/...`
    /// - `...?pageId={id}`; the space comes from a `/display/{space}/` segment
    ///   when present, otherwise `default_space`
    ///
    /// `.../display/{space}/{title}` carries no page id and is rejected, as is
    /// anything else.
    pub fn parse(url: &str, default_space: &str) -> Result<Self> {
        let url = url.trim();

        if let Some(caps) = SPACES_RE.captures(url) {
            let page = Self::new(&caps[2], &caps[1]);
            debug!(%url, %page, "parsed spaces URL");
            return Ok(page);
        }

        if let Some(caps) = PAGE_ID_RE.captures(url) {
            let space = DISPLAY_RE
                .captures(url)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| default_space.to_string());
            let page = Self::new(&caps[1], space);
            debug!(%url, %page, "parsed pageId URL");
            return Ok(page);
        }

        if DISPLAY_RE.is_match(url) {
            debug!(%url, "display URL has no page id");
        }

        Err(WikiReqError::unsupported_url(url))
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.space_key, self.page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_url() {
        let page = PageRef::parse(
            "https://wiki.example.com/spaces/BJS/pages/248936913/UC-Cancel+Expert+Support+Request",
            "DEF",
        )
        .unwrap();
        assert_eq!(page, PageRef::new("248936913", "BJS"));
    }

    #[test]
    fn spaces_url_without_title() {
        let page = PageRef::parse("https://wiki.example.com/spaces/OPS/pages/77", "DEF").unwrap();
        assert_eq!(page, PageRef::new("77", "OPS"));
    }

    #[test]
    fn page_id_url_uses_default_space() {
        let page = PageRef::parse(
            "https://wiki.example.com/pages/viewpage.action?pageId=123",
            "BJS",
        )
        .unwrap();
        assert_eq!(page, PageRef::new("123", "BJS"));
    }

    #[test]
    fn page_id_url_with_display_space() {
        let page = PageRef::parse(
            "https://wiki.example.com/display/HR/viewpage.action?spaceKey=HR&pageId=456",
            "BJS",
        )
        .unwrap();
        assert_eq!(page, PageRef::new("456", "HR"));
    }

    #[test]
    fn display_url_is_unsupported() {
        let err = PageRef::parse("https://wiki.example.com/display/BJS/Some+Title", "BJS")
            .unwrap_err();
        assert!(matches!(err, WikiReqError::UnsupportedUrlShape { .. }));
    }

    #[test]
    fn unrelated_url_is_unsupported() {
        for url in ["https://example.com/docs/page", "", "pageId=", "/spaces/BJS/pages/abc"] {
            let err = PageRef::parse(url, "BJS").unwrap_err();
            assert!(
                matches!(err, WikiReqError::UnsupportedUrlShape { .. }),
                "expected unsupported shape for {url:?}"
            );
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(PageRef::new("9", "BJS").to_string(), "BJS/9");
    }
}
