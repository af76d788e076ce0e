// src/crawl/folder.rs
// =============================================================================
// Folder links: a page listing files. Each file becomes a resource one
// directory deeper than the folder's own location.
// =============================================================================

use super::link::{create_folder, Link};
use super::unit::{Outcome, WorkUnit};
use super::CrawlContext;
use crate::error::CrawlError;
use crate::portal::parse;
use tracing::debug;

pub async fn download(mut link: Link, ctx: &CrawlContext) -> Result<Outcome, CrawlError> {
    debug!(name = %link.name, url = %link.url, "downloading folder");
    link.make_request(ctx).await?;
    if let Some(rejected) = link.reject_page() {
        return Ok(rejected);
    }

    let name = link.name.clone();
    link.push_subfolder(&name);

    let folder = link.folder(&ctx.settings.root);
    create_folder(&folder, ctx).await?;

    let entries = parse::folder_entries(&link.page_text(), &link.url);
    debug!(folder = %link.name, entries = entries.len(), "folder entries found");

    for entry in entries {
        ctx.queue.push(WorkUnit::Resource(link.child(entry.name, entry.url)));
    }

    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::test_support::context;
    use crate::crawl::Subject;
    use crate::http::mock::{self, MockClient};
    use std::sync::Arc;

    const FOLDER: &str = "https://campus/mod/folder/view.php?id=2";

    #[tokio::test]
    async fn test_entries_inherit_folder_path() {
        let dir = tempfile::tempdir().unwrap();
        let page = r#"
            <span class="fp-filename-icon"><a href="/pluginfile.php/1/p1.pdf"><span class="fp-filename">p1.pdf</span></a></span>
            <span class="fp-filename-icon"><a href="/pluginfile.php/1/p2.zip"><span class="fp-filename">p2.zip</span></a></span>
            <span class="fp-filename-icon"><span class="fp-filename">orphan.pdf</span></span>
        "#;
        let ctx = context(MockClient::new().page(FOLDER, page), dir.path());
        let subject = Arc::new(Subject::new("Redes", "https://campus/course/view.php?id=4"));

        let outcome = download(Link::new("Prácticas", FOLDER, subject), &ctx)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Completed));
        assert!(dir.path().join("Redes").join("Prácticas").is_dir());

        let queued = ctx.queue.take_all();
        assert_eq!(queued.len(), 2);
        for unit in &queued {
            let WorkUnit::Resource(child) = unit else {
                panic!("unexpected unit {unit}");
            };
            assert_eq!(child.subfolders, vec!["Prácticas".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_folder_with_overlong_name_still_enqueues_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file_url = "https://campus/pluginfile.php/1/p1.pdf";
        let page = r#"<span class="fp-filename-icon"><a href="/pluginfile.php/1/p1.pdf"><span class="fp-filename">p1.pdf</span></a></span>"#;
        let client = MockClient::new()
            .page(FOLDER, page)
            .respond(file_url, mock::file(file_url, "application/pdf", b"%PDF"));
        let ctx = context(client, dir.path());
        let subject = Arc::new(Subject::new("Redes", "https://campus/course/view.php?id=4"));

        // 260 bytes: one component over NAME_MAX
        let name = "á".repeat(130);
        let outcome = download(Link::new(name.clone(), FOLDER, subject), &ctx)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Completed));
        assert!(!dir.path().join("Redes").join(&name).exists());

        let mut queued = ctx.queue.take_all();
        assert_eq!(queued.len(), 1);
        let Some(WorkUnit::Resource(mut child)) = queued.pop() else {
            panic!("expected a resource");
        };

        child.make_request(&ctx).await.unwrap();
        child.save(&ctx).await.unwrap();

        let saved = child.filepath().unwrap().to_path_buf();
        assert_eq!(saved.parent(), Some(dir.path().join("Redes").as_path()));
        assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF");
        let real = ctx.aliases.real_for(&saved).unwrap();
        assert_eq!(real, dir.path().join("Redes").join(&name).join("p1.pdf"));
        assert_eq!(ctx.stats.snapshot().new_files, 1);
    }
}
