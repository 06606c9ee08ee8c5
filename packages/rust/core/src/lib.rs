//! Pipeline orchestration for wikireq.
//!
//! Ties the Confluence client and markup processing together into a single
//! run (`load` → `load_index` → `enrich` → `linearize`), with optional debug
//! artifacts and an agent-facing page loader tool.

pub mod artifacts;
pub mod pipeline;
pub mod tool;

pub use artifacts::{ArtifactWriter, WrittenArtifacts};
pub use pipeline::{
    IndexSource, PageSource, Pipeline, PipelineOutput, ProgressReporter, SilentProgress,
};
pub use tool::PageLoaderTool;
