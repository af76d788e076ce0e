// src/crawl/resource.rs
// =============================================================================
// Resource links: the things that end up as files on disk.
//
// 1. GET the URL (404 drops the item, 3xx moves the link and tries again)
// 2. Files are saved through the dedup cache
// 3. HTML pages wrap the real document; it is found and enqueued as a new
//    resource. Pages where it can't be found are dumped for inspection.
// =============================================================================

use super::content::{self, ContentKind};
use super::link::Link;
use super::unit::{DropReason, Outcome, WorkUnit};
use super::CrawlContext;
use crate::error::CrawlError;
use crate::portal::parse;
use std::path::PathBuf;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub async fn download(mut link: Link, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    debug!(name = %link.name, url = %link.url, "downloading resource");
    let mut hops = 0u32;

    let status = loop {
        let (status, redirect) = {
            let response = link.make_request(ctx).await?;
            let redirect = response.is_redirect().then(|| {
                response
                    .header("location")
                    .and_then(|location| parse::resolve_link(&response.url, location))
            });
            (response.status, redirect)
        };

        if status == 404 {
            warn!(url = %link.url, name = %link.name, "status code of 404");
            return Ok(Outcome::Recoverable(DropReason::NotFound));
        }

        let Some(location) = redirect else {
            break status;
        };
        let location = location.ok_or_else(|| CrawlError::MissingLocation {
            url: link.url.clone(),
        })?;

        hops += 1;
        if hops > ctx.settings.max_redirects {
            return Err(CrawlError::TooManyRedirects { url: link.url });
        }

        warn!(from = %link.url, to = %location, status, "redirecting resource");
        link.url = location;
    };

    if !(200..300).contains(&status) {
        warn!(url = %link.url, name = %link.name, status, "unexpected status for resource");
        return Ok(Outcome::Recoverable(DropReason::UnexpectedStatus(status)));
    }

    let content_type = link
        .response()
        .map(|r| r.content_type().to_string())
        .unwrap_or_default();

    match content::classify(&content_type) {
        ContentKind::File(_) => link.save(ctx).await,
        ContentKind::Html => find_embedded(link, ctx).await,
        ContentKind::Unknown => {
            warn!(url = %link.url, content_type = %content_type, "content not identified");
            Ok(Outcome::Recoverable(DropReason::UnknownContentType(content_type)))
        }
    }
}

async fn find_embedded(link: Link, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    let found = parse::embedded_resource(&link.page_text(), &link.url)
        // A page embedding itself would be fetched forever
        .filter(|embedded| embedded.url != link.url);

    let Some(embedded) = found else {
        let dump = dump_html(&link, ctx).await?;
        error!(
            url = %link.url,
            dump = %dump.display(),
            "resource markers missing from HTML page"
        );
        return Ok(Outcome::Recoverable(DropReason::TemplateMismatch(dump)));
    };

    let name = embedded.title.unwrap_or_else(|| link.name.clone());
    debug!(from = %link.url, to = %embedded.url, name = %name, "found embedded resource");
    ctx.queue.push(WorkUnit::Resource(link.child(name, embedded.url)));
    Ok(Outcome::Completed)
}

async fn dump_html(link: &Link, ctx: &CrawlContext) -> Result<PathBuf, CrawlError> {
    let dir = &ctx.settings.diagnostics_dir;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CrawlError::io(dir, e))?;

    let path = dir.join(format!("html-{}.html", Uuid::new_v4()));
    let body = link.response().map(|r| r.body.as_slice()).unwrap_or_default();
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| CrawlError::io(&path, e))?;
    Ok(path)
}
