// src/crawl/delivery.rs
// =============================================================================
// Delivery (assignment) links. The assignment page lists attachments, often
// several with the same name, so names are made unique before enqueueing.
// =============================================================================

use super::link::Link;
use super::unit::{Outcome, WorkUnit};
use super::CrawlContext;
use crate::error::CrawlError;
use crate::portal::parse;
use crate::store::naming::disambiguate_names;
use tracing::debug;

pub async fn download(mut link: Link, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    debug!(name = %link.name, url = %link.url, "downloading delivery");
    link.make_request(ctx).await?;
    if let Some(rejected) = link.reject_page() {
        return Ok(rejected);
    }

    let name = link.name.clone();
    link.push_subfolder(&name);

    let attachments = parse::delivery_attachments(&link.page_text(), &link.url);
    let names: Vec<String> = attachments.iter().map(|a| a.name.clone()).collect();
    let unique = disambiguate_names(&names);

    for (attachment, name) in attachments.into_iter().zip(unique) {
        if name != attachment.name {
            debug!(from = %attachment.name, to = %name, "changed name");
        }
        ctx.queue.push(WorkUnit::Resource(link.child(name, attachment.url)));
    }

    Ok(Outcome::Completed)
}
