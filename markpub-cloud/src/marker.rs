//! Published-URL annotation written at the top of a Markdown document.
//!
//! The annotation is a three-line HTML comment:
//!
//! ```text
//! <!-- Published file url:
//! https://dl.dropboxusercontent.com/s/<key>/notes.html
//! -->
//! ```
//!
//! Its first line doubles as the idempotency flag: a document whose first
//! line is exactly [`MARKER_HEADER`] is never annotated again. Only the first
//! line is inspected, so a document that carries the comment further down,
//! or a differently formatted marker, counts as unpublished.

use crate::error::{CloudError, CloudResult};

/// First line of the annotation.
pub const MARKER_HEADER: &str = "<!-- Published file url:";

/// Closing line of the annotation.
pub const MARKER_FOOTER: &str = "-->";

pub const MARKDOWN_EXTENSION: &str = ".md";
pub const HTML_EXTENSION: &str = ".html";

/// Returns true if the document's first line is the marker header.
pub fn is_published(markdown: &str) -> bool {
    markdown.split('\n').next() == Some(MARKER_HEADER)
}

/// Returns true if the path names a Markdown document.
pub fn is_markdown_path(path: &str) -> bool {
    path.ends_with(MARKDOWN_EXTENSION)
}

/// Sibling path of the rendered artifact: `.md` replaced by `.html`.
///
/// Paths without the Markdown extension get `.html` appended.
pub fn html_path_for(path: &str) -> String {
    let stem = path.strip_suffix(MARKDOWN_EXTENSION).unwrap_or(path);
    format!("{stem}{HTML_EXTENSION}")
}

/// Extracts the stable file key from a share URL.
///
/// Share URLs look like `https://www.dropbox.com/s/<key>/<name>`; the key is
/// the fifth `/`-separated component.
pub fn file_key_from_share_url(url: &str) -> CloudResult<&str> {
    match url.split('/').nth(4) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(CloudError::InvalidShareUrl(url.to_string())),
    }
}

/// Percent-encodes each path segment, keeping the separators.
pub fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical download URL for a published HTML file.
pub fn download_url(base: &str, file_key: &str, html_path: &str) -> String {
    format!("{base}{file_key}{}", escape_path(html_path))
}

/// Prepends the annotation for `url` to the document.
pub fn annotate(markdown: &str, url: &str) -> String {
    format!("{MARKER_HEADER}\n{url}\n{MARKER_FOOTER}\n{markdown}")
}

