use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Leading scheme, matched case-insensitively.
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").unwrap());

/// Separator that replaces `/` inside a key, so `site.com/my` becomes `site.com_my`.
pub const PATH_SEPARATOR: char = '_';

/// Canonical comparison key for a backup target.
///
/// Only [`DomainKey::normalize`] builds one, so every key in the program went
/// through the same normalization. Case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn normalize(raw: &str) -> Self {
        DomainKey(normalize_domain(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw domain or URL into its comparison form.
///
/// `https://www.site.com/my/` -> `www.site.com_my`
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = SCHEME_RE.replace(trimmed, "");
    let without_trailing = without_scheme.trim_end_matches('/');
    without_trailing
        .replace('/', &PATH_SEPARATOR.to_string())
        .trim()
        .to_string()
}

/// True for cells that plausibly hold a domain or URL.
pub fn looks_like_domain(cell: &str) -> bool {
    let trimmed = cell.trim();
    let lower = trimmed.to_lowercase();
    trimmed.contains('.') || lower.starts_with("http://") || lower.starts_with("https://")
}

/// Column titles such as "Domain", "Website URL".
pub fn is_header_like(cell: &str) -> bool {
    let lower = cell.trim().to_lowercase();
    ["domain", "url", "website"]
        .iter()
        .any(|word| lower.contains(word))
}

/// Filter a spreadsheet column down to normalized domain keys.
pub fn domains_from_cells<'a, I>(cells: I) -> Vec<DomainKey>
where
    I: IntoIterator<Item = &'a str>,
{
    cells
        .into_iter()
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .filter(|cell| looks_like_domain(cell) && !is_header_like(cell))
        .map(DomainKey::normalize)
        .filter(|key| !key.is_empty())
        .collect()
}
