// src/crawl/unit.rs
// =============================================================================
// Work units and what happens when one finishes.
//
// Every item in the queue is a WorkUnit. Workers call process() and get an
// Outcome back; nothing a unit does can take the worker down with it.
// =============================================================================

use super::link::Link;
use super::{delivery, folder, forum, resource, subject, CrawlContext, Subject};
use crate::error::CrawlError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug)]
pub enum WorkUnit {
    Subject(Arc<Subject>),
    Resource(Link),
    Folder(Link),
    Forum(Link),
    Delivery(Link),
}

#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// Logged and dropped, the crawl goes on
    Recoverable(DropReason),
    /// Counted against the run's exit code
    Fatal(CrawlError),
}

#[derive(Debug, Error)]
pub enum DropReason {
    #[error("status code of 404")]
    NotFound,

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("content type not identified: {0:?}")]
    UnknownContentType(String),

    #[error("no embedded document found, page saved to {}", .0.display())]
    TemplateMismatch(PathBuf),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Failed(#[from] CrawlError),
}

impl Outcome {
    pub fn from_result(result: Result<Outcome, CrawlError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => Outcome::Fatal(e),
            Err(e) => Outcome::Recoverable(DropReason::Failed(e)),
        }
    }
}

impl WorkUnit {
    pub async fn process(self, ctx: &CrawlContext) -> Outcome {
        let result = match self {
            WorkUnit::Subject(subject) => subject::discover(subject, ctx).await,
            WorkUnit::Resource(link) => resource::download(link, ctx).await,
            WorkUnit::Folder(link) => folder::download(link, ctx).await,
            WorkUnit::Forum(link) => forum::download(link, ctx).await,
            WorkUnit::Delivery(link) => delivery::download(link, ctx).await,
        };
        Outcome::from_result(result)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkUnit::Subject(_) => "subject",
            WorkUnit::Resource(_) => "resource",
            WorkUnit::Folder(_) => "folder",
            WorkUnit::Forum(_) => "forum",
            WorkUnit::Delivery(_) => "delivery",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            WorkUnit::Subject(subject) => &subject.url,
            WorkUnit::Resource(link)
            | WorkUnit::Folder(link)
            | WorkUnit::Forum(link)
            | WorkUnit::Delivery(link) => &link.url,
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::Subject(subject) => write!(f, "subject {:?}", subject.name),
            WorkUnit::Resource(link)
            | WorkUnit::Folder(link)
            | WorkUnit::Forum(link)
            | WorkUnit::Delivery(link) => {
                write!(f, "{} {:?} of {:?}", self.kind(), link.name, link.subject.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;

    #[test]
    fn test_only_unknown_forum_urls_are_fatal() {
        let fatal = Outcome::from_result(Err(CrawlError::UnknownForumUrl {
            url: "https://campus/mod/forum/post.php".to_string(),
        }));
        assert!(matches!(fatal, Outcome::Fatal(_)));

        let dropped = Outcome::from_result(Err(CrawlError::Http {
            url: "https://campus/x".to_string(),
            source: HttpError::Other("connection reset".to_string()),
        }));
        assert!(matches!(dropped, Outcome::Recoverable(DropReason::Failed(_))));

        let ok = Outcome::from_result(Ok(Outcome::Completed));
        assert!(matches!(ok, Outcome::Completed));
    }

    #[test]
    fn test_display_names_kind_and_subject() {
        let subject = Arc::new(Subject::new("Redes", "https://campus/course/view.php?id=7"));
        let unit = WorkUnit::Folder(Link::new("Prácticas", "https://campus/f", subject.clone()));
        assert_eq!(unit.to_string(), "folder \"Prácticas\" of \"Redes\"");
        assert_eq!(unit.url(), "https://campus/f");
        assert_eq!(WorkUnit::Subject(subject).to_string(), "subject \"Redes\"");
    }
}
