// src/store/naming.rs
// =============================================================================
// File naming rules for downloaded documents.
//
// - Display names from the portal become file names by dropping characters
//   that are illegal on common filesystems
// - The extension comes from Content-Disposition, then the URL basename,
//   then a hint derived from the Content-Type, then "ukn"
// - Sibling names that repeat get deterministic _1, _2, ... suffixes
// =============================================================================

use std::collections::HashMap;
use url::Url;

pub const UNKNOWN_EXTENSION: &str = "ukn";

// Extensions that name the page that served a file, not the file itself
const SCRIPT_EXTENSIONS: &[&str] = &["php", "html", "htm", "asp", "aspx", "jsp", "cgi"];

/// Strips characters that cannot appear in a path component.
///
/// Path separators become `-` so "Tema 1/2" stays readable as "Tema 1-2".
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' => Some('-'),
            ':' | '"' | '*' | '?' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.').trim_end();
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

// "apuntes.tema1.pdf" -> "apuntes.tema1"
pub fn file_stem(name: &str) -> &str {
    match name.trim().rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.trim(),
        _ => name.trim(),
    }
}

/// Picks the extension for a downloaded file.
pub fn infer_extension(
    content_disposition: Option<&str>,
    url: &str,
    content_type_hint: Option<&str>,
) -> String {
    let from_header = content_disposition
        .and_then(parse_content_disposition_filename)
        .and_then(|filename| extension_of(&filename));

    from_header
        .or_else(|| url_extension(url))
        .or_else(|| content_type_hint.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_EXTENSION.to_string())
}

fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let basename = parsed.path_segments()?.last()?;
    let ext = extension_of(basename)?;

    if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
        None
    } else {
        Some(ext)
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.trim().rsplit_once('.')?;
    let valid = !stem.is_empty()
        && (1..=8).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());

    valid.then(|| ext.to_ascii_lowercase())
}

/// Extracts the filename from a Content-Disposition header value.
///
/// `filename*=UTF-8''...` wins over a plain `filename=` parameter.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain = None;

    for param in header_value.split(';') {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key == "filename*" {
            let encoded = value
                .split_once("''")
                .map(|(_, rest)| rest)
                .unwrap_or(value);
            let decoded = percent_decode(encoded.trim_matches('"'));
            if !decoded.is_empty() {
                return Some(decoded);
            }
        } else if key == "filename" {
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
                .replace("\\\"", "\"");
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Gives every repeated name a numeric suffix in first-seen order.
///
/// `["a.pdf", "a.pdf", "b.pdf"]` becomes `["a_1.pdf", "a_2.pdf", "b.pdf"]`.
/// Names that occur once are left alone.
pub fn disambiguate_names(names: &[String]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *totals.entry(name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            if totals[name.as_str()] < 2 {
                return name.clone();
            }

            let counter = seen.entry(name.as_str()).or_default();
            *counter += 1;

            match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{counter}.{ext}"),
                _ => format!("{name}_{counter}"),
            }
        })
        .collect()
}
