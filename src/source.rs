//! Input source detection for local paths vs HTTP/HTTPS URLs.

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputSource {
    Local(PathBuf),
    Http(String),
}

/// Classifies the path as local or HTTP/HTTPS using string parsing only (no filesystem calls).
pub fn input_source(path: &Path) -> InputSource {
    let s = path.as_os_str().to_string_lossy();
    if let Some(after_scheme) = s.find("://") {
        let prefix = s[..after_scheme].to_lowercase();
        if prefix == "http" || prefix == "https" {
            return InputSource::Http(s.to_string());
        }
    }
    InputSource::Local(path.to_path_buf())
}

/// Returns the URL path (host, query and fragment stripped) and the extension of its last
/// segment, used to detect compression of downloaded files.
pub fn url_path_extension(url: &str) -> (String, Option<String>) {
    let path_part = match url.find("://") {
        Some(i) => {
            let after = &url[i + 3..];
            after
                .find('/')
                .map(|j| after[j + 1..].to_string())
                .unwrap_or_default()
        }
        None => String::new(),
    };
    let path_part = path_part
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();
    let last_segment = path_part.rsplit('/').next().unwrap_or(&path_part);
    let ext = Path::new(last_segment)
        .extension()
        .and_then(|e| e.to_str())
        .map(String::from);
    (path_part, ext)
}
