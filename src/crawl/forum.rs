// src/crawl/forum.rs
// =============================================================================
// Forum links. Two kinds of page share this unit:
//
// - view.php: the forum itself, listing its discussions
// - discuss.php: one discussion, whose posts carry attachments and images
//
// Files land in forums/<forum>/<discussion>/ (the shared "forums" folder can
// be turned off). Any other forum URL means the portal changed and the unit
// fails fatally.
// =============================================================================

use super::link::Link;
use super::unit::{Outcome, WorkUnit};
use super::CrawlContext;
use crate::error::CrawlError;
use crate::portal::parse;
use std::collections::HashSet;
use tracing::{debug, error};

pub const FORUMS_FOLDER: &str = "forums";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumPage {
    Listing,
    Discussion,
}

impl ForumPage {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.contains("view.php") {
            Some(ForumPage::Listing)
        } else if url.contains("discuss.php") {
            Some(ForumPage::Discussion)
        } else {
            None
        }
    }
}

pub async fn download(mut link: Link, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    debug!(name = %link.name, url = %link.url, "downloading forum");
    let Some(page) = ForumPage::from_url(&link.url) else {
        error!(url = %link.url, name = %link.name, "unknown url for forum");
        return Err(CrawlError::UnknownForumUrl { url: link.url });
    };

    link.make_request(ctx).await?;
    if let Some(rejected) = link.reject_page() {
        return Ok(rejected);
    }

    if link.subfolders.is_empty() && ctx.settings.forums_subfolder {
        link.push_subfolder(FORUMS_FOLDER);
    }
    let name = link.name.clone();
    link.push_subfolder(&name);

    let html = link.page_text();
    match page {
        ForumPage::Listing => {
            let topics = parse::forum_topics(&html, &link.url);
            debug!(forum = %link.name, topics = topics.len(), "forum topics found");
            for topic in topics {
                ctx.queue.push(WorkUnit::Forum(link.child(topic.name, topic.url)));
            }
        }
        ForumPage::Discussion => {
            let mut seen = HashSet::new();
            let files = parse::forum_attachments(&html, &link.url)
                .into_iter()
                .chain(parse::forum_images(&html, &link.url))
                .filter(|file| seen.insert(file.url.clone()))
                .collect::<Vec<_>>();

            debug!(topic = %link.name, files = files.len(), "discussion files found");
            for file in files {
                ctx.queue.push(WorkUnit::Resource(link.child(file.name, file.url)));
            }
        }
    }

    Ok(Outcome::Completed)
}
