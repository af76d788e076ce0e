// src/portal/parse.rs
// =============================================================================
// Page-template parsing for the course portal.
//
// Every function takes the raw HTML plus the URL it was served from and
// returns owned data. `scraper::Html` is not Send, so it must never live
// across an `.await`; keeping the parsing in plain synchronous functions
// guarantees that.
//
// Templates understood here:
// - dashboard:   div.course_title > h2 > a[title]
// - subject:     li.activity.modtype_{resource,folder,forum,assign}
// - folder:      span.fp-filename-icon > a
// - forum list:  td.topic.starter > a
// - discussion:  div.attachments a, div.attachedimages img
// - delivery:    a[target=_blank]
// - resource:    object#resourceobject, iframe#resourceobject,
//                div.resourceworkaround a
// =============================================================================

use crate::store::naming::file_stem;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A named link found on a page, already resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub name: String,
    pub url: String,
}

/// Module types on a subject page that contain downloadable documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Resource,
    Folder,
    Forum,
    /// Assignment ("assign") with submission attachments
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub link: PageLink,
}

/// The document embedded in an HTML resource page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedResource {
    pub url: String,
    /// Main heading of the page, when it has one
    pub title: Option<String>,
}

// Selectors are string constants in this file, so parsing can only fail if
// one of them is edited into invalid CSS.
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

// Text directly inside the element, skipping nested spans such as the
// screen-reader-only "accesshide" labels
fn own_text(element: ElementRef) -> String {
    let text: String = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect();
    collapse_whitespace(&text)
}

/// Resolves a (possibly relative) link against the page it was found on.
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}

/// Courses listed on the dashboard. The name is the link title up to the
/// first " (", which is where the portal appends the academic year.
pub fn course_listing(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let links = selector("div.course_title h2 a[href]");

    document
        .select(&links)
        .filter_map(|a| {
            let url = resolve_link(base, a.value().attr("href")?)?;
            let title = a
                .value()
                .attr("title")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(a));
            let name = title.split(" (").next().unwrap_or_default().trim().to_string();
            (!name.is_empty()).then_some(PageLink { name, url })
        })
        .collect()
}

/// Downloadable activities on a subject's landing page, in page order.
pub fn activities(html: &str, base: &str) -> Vec<Activity> {
    let document = Html::parse_document(html);
    let items = selector("li.activity");
    let anchor = selector("div.activityinstance a[href]");
    let instance_name = selector("span.instancename");

    let mut found = Vec::new();
    for item in document.select(&items) {
        let Some(kind) = item.value().classes().find_map(activity_kind) else {
            continue;
        };
        let Some(a) = item.select(&anchor).next() else {
            continue;
        };
        let Some(url) = a.value().attr("href").and_then(|h| resolve_link(base, h)) else {
            continue;
        };

        let name = a
            .select(&instance_name)
            .next()
            .map(own_text)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| element_text(a));

        found.push(Activity {
            kind,
            link: PageLink { name, url },
        });
    }
    found
}

fn activity_kind(class: &str) -> Option<ActivityKind> {
    match class.trim_start_matches("modtype_") {
        "resource" => Some(ActivityKind::Resource),
        "folder" => Some(ActivityKind::Folder),
        "forum" => Some(ActivityKind::Forum),
        "assign" => Some(ActivityKind::Delivery),
        _ => None,
    }
}

/// Files listed inside a folder. Entries without the icon + link pair are
/// skipped.
pub fn folder_entries(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let containers = selector("span.fp-filename-icon");
    let anchor = selector("a[href]");

    document
        .select(&containers)
        .filter_map(|span| {
            let a = span.select(&anchor).next()?;
            let url = resolve_link(base, a.value().attr("href")?)?;
            let name = file_stem(&element_text(a)).to_string();
            Some(PageLink { name, url })
        })
        .collect()
}

/// Discussions listed on a forum's view page.
pub fn forum_topics(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let topics = selector("td.topic.starter a[href]");

    document
        .select(&topics)
        .filter_map(|a| {
            let url = resolve_link(base, a.value().attr("href")?)?;
            Some(PageLink {
                name: element_text(a),
                url,
            })
        })
        .collect()
}

/// Attachments of every post in a discussion. Icon-only links (no text)
/// are skipped since the same file is always linked again by name.
pub fn forum_attachments(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let links = selector("div.attachments a[href]");

    document
        .select(&links)
        .filter_map(|a| {
            let text = element_text(a);
            if text.is_empty() {
                return None;
            }
            let url = resolve_link(base, a.value().attr("href")?)?;
            Some(PageLink {
                name: file_stem(&text).to_string(),
                url,
            })
        })
        .collect()
}

/// Images attached inline to discussion posts.
pub fn forum_images(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let images = selector("div.attachedimages img[src]");

    document
        .select(&images)
        .filter_map(|img| {
            let url = resolve_link(base, img.value().attr("src")?)?;
            let name = img
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(|alt| file_stem(alt).to_string())
                .or_else(|| basename_stem(&url))?;
            Some(PageLink { name, url })
        })
        .collect()
}

/// Attachment links on an assignment page (they open in a new tab).
pub fn delivery_attachments(html: &str, base: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let links = selector("a[target=\"_blank\"][href]");

    document
        .select(&links)
        .filter_map(|a| {
            let url = resolve_link(base, a.value().attr("href")?)?;
            Some(PageLink {
                name: file_stem(&element_text(a)).to_string(),
                url,
            })
        })
        .collect()
}

/// Finds the real document behind an HTML resource page: the embedded
/// object, else the iframe, else the "click here" workaround link.
pub fn embedded_resource(html: &str, base: &str) -> Option<EmbeddedResource> {
    let document = Html::parse_document(html);

    let candidates = [
        ("object#resourceobject[data]", "data"),
        ("iframe#resourceobject[src]", "src"),
        ("div.resourceworkaround a[href]", "href"),
    ];

    let url = candidates.iter().find_map(|(css, attr)| {
        let element = document.select(&selector(css)).next()?;
        resolve_link(base, element.value().attr(attr)?)
    })?;

    let title = document
        .select(&selector("div[role=\"main\"] h2"))
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    Some(EmbeddedResource { url, title })
}

fn basename_stem(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.last()?;
    let stem = file_stem(last);
    (!stem.is_empty()).then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://campusvirtual.uva.es/course/view.php?id=10";

    #[test]
    fn test_resolve_relative_and_skipped_links() {
        assert_eq!(
            resolve_link(BASE, "/mod/folder/view.php?id=3").as_deref(),
            Some("https://campusvirtual.uva.es/mod/folder/view.php?id=3")
        );
        assert_eq!(resolve_link(BASE, "#section-2"), None);
        assert_eq!(resolve_link(BASE, "mailto:prof@uva.es"), None);
    }

    #[test]
    fn test_course_listing_uses_title_before_parenthesis() {
        let html = r#"
            <div class="course_title"><h2 class="title">
              <a title="Álgebra Lineal (2023-24)" href="https://campusvirtual.uva.es/course/view.php?id=10">Álgebra</a>
            </h2></div>
            <div class="course_title"><h2><a href="/course/view.php?id=11">Cálculo</a></h2></div>
        "#;

        let courses = course_listing(html, "https://campusvirtual.uva.es/my/");
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].name, "Álgebra Lineal");
        assert_eq!(courses[1].name, "Cálculo");
        assert_eq!(courses[1].url, "https://campusvirtual.uva.es/course/view.php?id=11");
    }

    #[test]
    fn test_activities_by_module_type() {
        let html = r#"
          <ul>
            <li class="activity resource modtype_resource"><div class="activityinstance">
              <a href="/mod/resource/view.php?id=1"><span class="instancename">Tema 1<span class="accesshide"> Archivo</span></span></a>
            </div></li>
            <li class="activity folder modtype_folder"><div class="activityinstance">
              <a href="/mod/folder/view.php?id=2"><span class="instancename">Prácticas</span></a>
            </div></li>
            <li class="activity forum modtype_forum"><div class="activityinstance">
              <a href="/mod/forum/view.php?id=3"><span class="instancename">Avisos</span></a>
            </div></li>
            <li class="activity assign modtype_assign"><div class="activityinstance">
              <a href="/mod/assign/view.php?id=4"><span class="instancename">Entrega 1</span></a>
            </div></li>
            <li class="activity quiz modtype_quiz"><div class="activityinstance">
              <a href="/mod/quiz/view.php?id=5"><span class="instancename">Test</span></a>
            </div></li>
          </ul>
        "#;

        let found = activities(html, BASE);
        let kinds: Vec<_> = found.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::Resource,
                ActivityKind::Folder,
                ActivityKind::Forum,
                ActivityKind::Delivery
            ]
        );
        assert_eq!(found[0].link.name, "Tema 1");
        assert_eq!(
            found[1].link.url,
            "https://campusvirtual.uva.es/mod/folder/view.php?id=2"
        );
    }

    #[test]
    fn test_folder_entries_skip_broken_pairs() {
        let html = r#"
          <span class="fp-filename-icon"><a href="https://campusvirtual.uva.es/pluginfile.php/1/mod_folder/content/0/p1.pdf">
            <span class="fp-icon"><img src="pdf.svg"></span><span class="fp-filename">p1.pdf</span></a></span>
          <span class="fp-filename-icon"><span class="fp-filename">orphan.pdf</span></span>
          <span class="fp-filename-icon"><a href="/pluginfile.php/1/mod_folder/content/0/datos.v2.zip">datos.v2.zip</a></span>
        "#;

        let entries = folder_entries(html, BASE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "p1");
        assert_eq!(entries[1].name, "datos.v2");
    }

    #[test]
    fn test_forum_topics_and_discussion_content() {
        let listing = r#"
          <table><tr><td class="topic starter"><a href="/mod/forum/discuss.php?d=7">Examen final</a></td></tr>
          <tr><td class="topic starter"><a href="/mod/forum/discuss.php?d=8">Notas</a></td></tr></table>
        "#;
        let topics = forum_topics(listing, BASE);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Examen final");

        let discussion = r#"
          <div class="attachments">
            <a href="/pluginfile.php/9/mod_forum/attachment/7/enunciado.pdf"><img class="icon" src="pdf.svg"></a>
            <a href="/pluginfile.php/9/mod_forum/attachment/7/enunciado.pdf">enunciado.pdf</a><br>
          </div>
          <div class="attachedimages">
            <img src="/pluginfile.php/9/mod_forum/attachment/8/pizarra.jpg" alt="pizarra.jpg">
            <img src="/pluginfile.php/9/mod_forum/attachment/8/foto2.png">
          </div>
        "#;
        let attachments = forum_attachments(discussion, BASE);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name, "enunciado");

        let images = forum_images(discussion, BASE);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "pizarra");
        assert_eq!(images[1].name, "foto2");
    }

    #[test]
    fn test_delivery_attachments_open_in_new_tab() {
        let html = r#"
          <a target="_blank" href="/pluginfile.php/2/assignsubmission_file/submission_files/1/memoria.pdf">memoria.pdf</a>
          <a href="/mod/assign/view.php?id=4&action=grading">Calificar</a>
          <a target="_blank" href="/pluginfile.php/2/assignsubmission_file/submission_files/2/memoria.pdf">memoria.pdf</a>
        "#;

        let links = delivery_attachments(html, BASE);
        let names: Vec<_> = links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["memoria", "memoria"]);
    }

    #[test]
    fn test_embedded_resource_fallback_order() {
        let object = r#"<div role="main"><h2>Tema 2</h2>
            <object id="resourceobject" data="/pluginfile.php/3/t2.pdf"></object>
            <iframe id="resourceobject" src="/pluginfile.php/3/other.pdf"></iframe></div>"#;
        let found = embedded_resource(object, BASE).unwrap();
        assert_eq!(found.url, "https://campusvirtual.uva.es/pluginfile.php/3/t2.pdf");
        assert_eq!(found.title.as_deref(), Some("Tema 2"));

        let iframe = r#"<iframe id="resourceobject" src="/pluginfile.php/3/video.mp4"></iframe>"#;
        let found = embedded_resource(iframe, BASE).unwrap();
        assert!(found.url.ends_with("video.mp4"));
        assert_eq!(found.title, None);

        let workaround = r#"<div class="resourceworkaround">Click <a href="/pluginfile.php/3/a.docx">a.docx</a></div>"#;
        assert!(embedded_resource(workaround, BASE).unwrap().url.ends_with("a.docx"));

        assert_eq!(embedded_resource("<p>nothing here</p>", BASE), None);
    }
}
