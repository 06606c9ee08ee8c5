//! Confluence access for wikireq.
//!
//! - [`PageRef`] decomposes page URLs into page id and space key
//! - [`ConfluenceClient`] fetches page markup and the requirements index
//! - [`parse_index`] turns index JSON into a [`wikireq_shared::RequirementIndex`]
//! - [`RetryPolicy`] bounds retries of upstream calls

mod client;
mod index;
mod page_ref;
mod retry;

pub use client::{ConfluenceClient, FetchFailure};
pub use index::{IndexStats, load_index_file, parse_index};
pub use page_ref::PageRef;
pub use retry::RetryPolicy;
