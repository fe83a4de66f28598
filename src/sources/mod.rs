//! Source fetchers: where raw content comes from.
//!
//! | Source | Module | Produces |
//! |--------|--------|----------|
//! | REST API / web page | [`http`] | one [`RawContent`](crate::models::RawContent) |
//! | Local file | [`local`] | one `RawContent` |
//! | Capture directory | [`local`] | one [`Artifact`](crate::models::Artifact) per subject |
//! | Nitter mirrors | [`nitter`] | timeline text for one subject |
//!
//! Every fetcher fails with [`PipelineError::Fetch`](crate::error::PipelineError::Fetch)
//! instead of returning an empty result on a bad status or missing path.

pub mod http;
pub mod local;
pub mod nitter;
