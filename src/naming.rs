//! Artifact filenames and the per-run stores that hand them out.

use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::Mutex;

const RENDERED_SUFFIX: &str = ".rendered.html";

const EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
    ("application/json", ".json"),
    ("application/xml", ".xml"),
    ("application/msword", ".doc"),
    ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", ".docx"),
    ("application/vnd.ms-excel", ".xls"),
    ("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", ".xlsx"),
    ("application/vnd.ms-powerpoint", ".ppt"),
    ("application/vnd.openxmlformats-officedocument.presentationml.presentation", ".pptx"),
    ("application/octet-stream", ".bin"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("audio/mpeg", ".mp3"),
    ("audio/wav", ".wav"),
    ("video/mp4", ".mp4"),
    ("video/webm", ".webm"),
    ("text/html", ".html"),
    ("text/plain", ".txt"),
    ("text/csv", ".csv"),
];

/// Pick a filename: the `Content-Disposition` name, else the last URL path
/// segment, else `download` plus an extension guessed from `content_type`.
pub fn guess_name(url: &str, disposition_name: Option<&str>, content_type: &str) -> String {
    if let Some(name) = disposition_name.map(sanitize).filter(|n| is_usable(n)) {
        return name;
    }

    let path = url.split(['?', '#']).next().unwrap_or_default().trim_end_matches('/');
    let basename = sanitize(path.rsplit('/').next().unwrap_or_default());
    if is_usable(&basename) {
        return basename;
    }

    format!("download{}", extension_for(content_type))
}

/// Name for a raw page capture; always ends in `.html`.
pub fn page_name(url: &str) -> String {
    let mut name = guess_name(url, None, "text/html");
    if !name.to_lowercase().ends_with(".html") {
        name.push_str(".html");
    }
    name
}

/// Name for a rendered capture, distinct from the raw capture of the same URL.
pub fn rendered_name(url: &str) -> String {
    let name = guess_name(url, None, "text/html");
    let stem = strip_suffix_ignore_case(&name, ".html")
        .or_else(|| strip_suffix_ignore_case(&name, ".htm"))
        .unwrap_or(&name);
    format!("{stem}{RENDERED_SUFFIX}")
}

pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    EXTENSIONS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
        .unwrap_or(".bin")
}

/// Replace characters most filesystems reject.
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn is_usable(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = name.len().checked_sub(suffix.len())?;
    if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(suffix) && cut > 0 {
        Some(&name[..cut])
    } else {
        None
    }
}

/// Directory of artifacts whose names are unique within one run: a second
/// claim of `a.pdf` gets `a-2.pdf`, then `a-3.pdf`.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    claimed: Mutex<HashSet<String>>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve `name` (or the first free variant of it) and return its path.
    pub async fn claim(&self, name: &str) -> PathBuf {
        let mut claimed = self.claimed.lock().await;
        let mut candidate = name.to_string();
        let mut n = 2;
        while claimed.contains(&candidate) {
            candidate = numbered(name, n);
            n += 1;
        }
        claimed.insert(candidate.clone());
        self.dir.join(candidate)
    }
}

fn numbered(name: &str, n: usize) -> String {
    if let Some(stem) = strip_suffix_ignore_case(name, RENDERED_SUFFIX) {
        return format!("{stem}-{n}{RENDERED_SUFFIX}");
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{n}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}-{n}"),
    }
}
