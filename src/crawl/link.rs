// src/crawl/link.rs
// =============================================================================
// State shared by every kind of link (resource, folder, forum, delivery).
//
// Lifecycle:
// 1. make_request: GET the URL through the retry wrapper
// 2. resolve_filepath: decide where the file goes (once, after a request)
// 3. save: write the body unless the dedup cache says it's unchanged
//
// Which of these run, and what gets enqueued afterwards, is decided by the
// variant modules next to this one.
// =============================================================================

use super::content;
use super::unit::{DropReason, Outcome};
use super::{CrawlContext, Subject};
use crate::error::CrawlError;
use crate::http::{get_with_retry, Response};
use crate::store::naming::{infer_extension, sanitize_name};
use crate::store::SaveDecision;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Link {
    /// Display name, also the base of the file name
    pub name: String,
    pub url: String,
    pub subject: Arc<Subject>,
    /// Folders between the subject folder and the file, outermost first
    pub subfolders: Vec<String>,
    filepath: Option<PathBuf>,
    response: Option<Response>,
}

impl Link {
    pub fn new(name: impl Into<String>, url: impl Into<String>, subject: Arc<Subject>) -> Self {
        let link = Self {
            name: name.into().trim().to_string(),
            url: url.into(),
            subject,
            subfolders: Vec::new(),
            filepath: None,
            response: None,
        };
        debug!(name = %link.name, url = %link.url, subject = %link.subject.name, "created link");
        link
    }

    // A link found on this link's page: same subject, same folders
    pub fn child(&self, name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut child = Link::new(name, url, Arc::clone(&self.subject));
        child.subfolders = self.subfolders.clone();
        child
    }

    pub fn push_subfolder(&mut self, name: &str) {
        debug!(subfolder = name, link = %self.name, "added subfolder");
        self.subfolders.push(name.trim().to_string());
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    #[cfg(test)]
    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    pub async fn make_request(&mut self, ctx: &CrawlContext) -> Result<&Response, CrawlError> {
        debug!(url = %self.url, "making request");
        let settings = &ctx.settings;
        let response = get_with_retry(
            ctx.client.as_ref(),
            &self.url,
            Some(settings.request_timeout),
            &settings.retry,
        )
        .await?;

        debug!(url = %self.url, status = response.status, "response obtained");
        Ok(self.response.insert(response))
    }

    /// Directory this link's files go into.
    pub fn folder(&self, root: &Path) -> PathBuf {
        self.subfolders
            .iter()
            .fold(self.subject.folder(root), |path, segment| {
                path.join(sanitize_name(segment))
            })
    }

    /// Destination of the response body. Computed on the first call and
    /// returned unchanged afterwards.
    pub fn resolve_filepath(&mut self, ctx: &CrawlContext) -> Result<PathBuf, CrawlError> {
        if let Some(path) = &self.filepath {
            debug!(path = %path.display(), "filepath already set");
            return Ok(path.clone());
        }

        let response = self.response.as_ref().ok_or_else(|| CrawlError::RequestNotMade {
            name: self.name.clone(),
        })?;

        let extension = infer_extension(
            response.header("content-disposition"),
            &response.url,
            content::extension_hint(response.content_type()),
        );
        let filename = format!("{}.{}", sanitize_name(&self.name), extension);

        let root = &ctx.settings.root;
        let real = self.folder(root).join(filename);

        // Aliases go in the subject folder unless that one is too long itself
        let subject_dir = self.subject.folder(root);
        let alias_dir = if ctx.aliases.fits(&subject_dir) {
            subject_dir
        } else {
            root.clone()
        };
        let path = ctx.aliases.resolve(&real, &self.url, &alias_dir);

        debug!(path = %path.display(), "set filepath");
        self.filepath = Some(path.clone());
        Ok(path)
    }

    pub async fn save(&mut self, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
        let path = self.resolve_filepath(ctx)?;
        let response = self.response.as_ref().ok_or_else(|| CrawlError::RequestNotMade {
            name: self.name.clone(),
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CrawlError::io(parent, e))?;
        }

        let length = response.content_length();
        let decision = ctx.cache.record(&path, length);
        if !decision.needs_write() {
            debug!(path = %path.display(), length, "file found in cache: same content");
            ctx.stats.unchanged();
            return Ok(Outcome::Completed);
        }

        match tokio::fs::write(&path, &response.body).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                ctx.cache.rollback(&path, decision);
                warn!(
                    subject = %self.subject.name,
                    path = %path.display(),
                    "file couldn't be downloaded due to permission error"
                );
                ctx.stats.skipped();
                return Ok(Outcome::Completed);
            }
            Err(e) => {
                ctx.cache.rollback(&path, decision);
                return Err(CrawlError::io(path, e));
            }
        }

        // Reports use the real destination even when the file is aliased
        let shown = ctx.aliases.real_for(&path).unwrap_or_else(|| path.clone());
        match decision {
            SaveDecision::New => {
                info!(path = %shown.display(), length, "new file");
                println!("New file: {}", shown.display());
                ctx.stats.new_file();
            }
            SaveDecision::Updated { previous } => {
                info!(path = %shown.display(), previous, length, "file updated");
                println!("File updated: {}", shown.display());
                ctx.stats.updated_file();
            }
            SaveDecision::Unchanged => {}
        }

        ctx.downloads.record(&self.subject.name, &shown);
        Ok(Outcome::Completed)
    }

    /// Outcome for a page that must be HTML with a 2xx status, or None when
    /// the page can be parsed.
    pub fn reject_page(&self) -> Option<Outcome> {
        let response = self.response.as_ref()?;
        match response.status {
            200..=299 => None,
            404 => {
                warn!(url = %self.url, name = %self.name, "status code of 404");
                Some(Outcome::Recoverable(DropReason::NotFound))
            }
            status => {
                warn!(url = %self.url, name = %self.name, status, "unexpected status");
                Some(Outcome::Recoverable(DropReason::UnexpectedStatus(status)))
            }
        }
    }

    pub fn page_text(&self) -> String {
        self.response.as_ref().map(Response::text).unwrap_or_default()
    }
}

/// Creates a subject or folder directory up front. A path too long for the
/// filesystem is left alone: the files inside it are saved under an alias.
pub async fn create_folder(path: &Path, ctx: &CrawlContext) -> Result<(), CrawlError> {
    if !ctx.aliases.fits(path) {
        warn!(path = %path.display(), "folder path too long, its files will be aliased");
        return Ok(());
    }

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| CrawlError::io(path, e))
}
