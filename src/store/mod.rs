// src/store/mod.rs
// =============================================================================
// Local persistence used by the crawler:
// - cache: path -> content length, so unchanged files are not rewritten
// - alias: short hash-named paths for destinations that are too long
// - naming: sanitized file names and extension inference
// - downloads_log: append-only record of saved files
// =============================================================================

pub mod alias;
pub mod cache;
pub mod downloads_log;
pub mod naming;

pub use alias::AliasRegistry;
pub use cache::{DedupCache, SaveDecision};
pub use downloads_log::DownloadsLog;
