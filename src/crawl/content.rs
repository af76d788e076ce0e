// src/crawl/content.rs
// =============================================================================
// Content-Type dispatch for resources.
//
// A resource response is either a file to save as is, an HTML page that
// wraps the real file, or something the crawler doesn't know how to handle.
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Save the body; the hint is used when no better extension is known
    File(Option<&'static str>),
    /// Parse the page and look for the embedded document
    Html,
    Unknown,
}

// Matched as substrings of the lowercased Content-Type, in order.
const FILE_TYPES: &[(&str, Option<&str>)] = &[
    ("application/pdf", Some("pdf")),
    ("officedocument.wordprocessingml.document", Some("docx")),
    ("officedocument.spreadsheetml.sheet", Some("xlsx")),
    ("officedocument.presentationml.presentation", Some("pptx")),
    ("officedocument.presentationml.slideshow", Some("ppsx")),
    ("msword", Some("doc")),
    ("ms-excel", Some("xls")),
    ("ms-powerpoint", Some("ppt")),
    ("opendocument.text", Some("odt")),
    ("application/zip", Some("zip")),
    ("application/x-zip-compressed", Some("zip")),
    ("application/g-zip", Some("gz")),
    ("application/gzip", Some("gz")),
    ("application/x-gzip", Some("gz")),
    ("application/x-7z-compressed", Some("7z")),
    ("application/x-rar-compressed", Some("rar")),
    ("application/vnd.rar", Some("rar")),
    ("text/plain", Some("txt")),
    ("application/json", Some("json")),
    ("application/octet-stream", None),
    ("image/jpeg", Some("jpg")),
    ("image/png", Some("png")),
    ("image/gif", Some("gif")),
    ("video/mp4", Some("mp4")),
    ("video/webm", Some("webm")),
    ("video/quicktime", Some("mov")),
    ("video/", None),
];

pub fn classify(content_type: &str) -> ContentKind {
    let content_type = content_type.to_ascii_lowercase();

    if let Some((_, hint)) = FILE_TYPES
        .iter()
        .find(|(pattern, _)| content_type.contains(pattern))
    {
        return ContentKind::File(*hint);
    }

    if content_type.contains("text/html") {
        ContentKind::Html
    } else {
        ContentKind::Unknown
    }
}

pub fn extension_hint(content_type: &str) -> Option<&'static str> {
    match classify(content_type) {
        ContentKind::File(hint) => hint,
        ContentKind::Html | ContentKind::Unknown => None,
    }
}
