// src/crawl/subject.rs
// =============================================================================
// A course on the portal and the discovery of its activities.
// =============================================================================

use super::link::{create_folder, Link};
use super::unit::{DropReason, Outcome, WorkUnit};
use super::CrawlContext;
use crate::error::CrawlError;
use crate::http::get_with_retry;
use crate::portal::parse::{self, ActivityKind};
use crate::store::naming::sanitize_name;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    pub url: String,
}

impl Subject {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            url: url.into(),
        }
    }

    pub fn folder(&self, root: &Path) -> PathBuf {
        root.join(sanitize_name(&self.name))
    }
}

/// Fetches the subject page and enqueues one unit per downloadable activity.
pub async fn discover(subject: Arc<Subject>, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    debug!(subject = %subject.name, url = %subject.url, "finding links");
    let settings = &ctx.settings;
    let response = get_with_retry(
        ctx.client.as_ref(),
        &subject.url,
        Some(settings.request_timeout),
        &settings.retry,
    )
    .await?;

    match response.status {
        200..=299 => {}
        404 => {
            warn!(subject = %subject.name, "subject page returned 404");
            return Ok(Outcome::Recoverable(DropReason::NotFound));
        }
        status => {
            warn!(subject = %subject.name, status, "unexpected status for subject page");
            return Ok(Outcome::Recoverable(DropReason::UnexpectedStatus(status)));
        }
    }

    let folder = subject.folder(&settings.root);
    create_folder(&folder, ctx).await?;

    let activities = parse::activities(&response.text(), &response.url);
    let found = activities.len();

    for activity in activities {
        let link = Link::new(activity.link.name, activity.link.url, Arc::clone(&subject));
        let unit = match activity.kind {
            ActivityKind::Resource => WorkUnit::Resource(link),
            ActivityKind::Folder => WorkUnit::Folder(link),
            ActivityKind::Forum => WorkUnit::Forum(link),
            ActivityKind::Delivery => WorkUnit::Delivery(link),
        };
        ctx.queue.push(unit);
    }

    info!(subject = %subject.name, links = found, "links found");
    Ok(Outcome::Completed)
}
