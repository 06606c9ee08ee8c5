//! Confluence markup handling: lenient parsing, requirement enrichment, and
//! plain-text linearization.
//!
//! This crate provides:
//! - [`tree`]: owned, typed markup tree with query helpers
//! - [`enrich`]: splice requirement definitions next to their markers
//! - [`linearize`]: flatten (enriched) markup into prompt-ready text

pub mod enrich;
pub mod linearize;
pub mod tree;

pub use enrich::{
    DEFINITION_CLASS, EnrichOptions, EnrichReport, EnrichedDocument, enrich, enrich_document,
    is_requirement_marker, marker_key,
};
pub use linearize::{linearize, linearize_document, markup_to_inline_text, to_inline_text};
pub use tree::{Document, Element, Node};

#[cfg(test)]
mod tests {
    use super::*;
    use wikireq_shared::{RawDocument, RequirementIndex, RequirementRecord};

    fn load_fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    #[test]
    fn end_to_end_single_marker() {
        let raw = RawDocument::new(
            r#"<macro name="requirement"><param name="key">BR-404</param></macro>"#,
        );
        let index: RequirementIndex = [RequirementRecord::new("BR-404")
            .with_origin("Catalog A")
            .with_excerpt("must be non-empty")]
        .into_iter()
        .collect();

        let enriched = enrich(&raw, &index, &EnrichOptions::default());
        let markup = enriched.to_markup();
        assert!(markup.contains("BR-404"));
        assert!(markup.contains("(Catalog A: must be non-empty)"));

        let text = linearize(&markup);
        assert_eq!(text, "BR-404 (Catalog A: must be non-empty)");
        assert!(!text.contains('<'));
        assert!(!text.contains('>'));
    }

    #[test]
    fn linearizing_tree_matches_linearizing_markup() {
        let raw = RawDocument::new(load_fixture("html/use_case_page.html"));
        let index: RequirementIndex = [
            RequirementRecord::new("ACT-006").with_origin("Actors").with_excerpt("Expert"),
            RequirementRecord::new("CASE-EXP-STS-001")
                .with_origin("Case Statuses")
                .with_excerpt("Under review"),
        ]
        .into_iter()
        .collect();

        let enriched = enrich(&raw, &index, &EnrichOptions::default());
        assert_eq!(
            linearize_document(&enriched.document),
            linearize(&enriched.to_markup())
        );
    }

    #[test]
    fn use_case_fixture() {
        let raw = RawDocument::new(load_fixture("html/use_case_page.html"));
        let index: RequirementIndex = [
            RequirementRecord::new("ACT-006")
                .with_origin("Actors")
                .with_excerpt("@ActorNameEn: Expert"),
            RequirementRecord::new("MSG-665")
                .with_origin("System Messages")
                .with_excerpt("Request cancelled\n  successfully"),
        ]
        .into_iter()
        .collect();

        let enriched = enrich(&raw, &index, &EnrichOptions::default());
        assert_eq!(enriched.report.markers, 3);
        assert_eq!(enriched.report.annotated, vec!["ACT-006", "MSG-665"]);
        assert_eq!(enriched.report.unresolved, vec!["CASE-EXP-STS-001"]);

        let text = linearize_document(&enriched.document);
        assert!(text.contains("Cancel Expert Support Request"));
        assert!(text.contains("ACT-006 (Actors: @ActorNameEn: Expert)"));
        assert!(text.contains("MSG-665 (System Messages: Request cancelled successfully)"));
        assert!(text.contains("CASE-EXP-STS-001"));
        assert!(text.contains("Step | Description |"));
        assert!(!text.contains("trackPageView"));
        assert!(!text.contains('<'));
        assert!(!text.contains("\n\n\n"));
    }
}
