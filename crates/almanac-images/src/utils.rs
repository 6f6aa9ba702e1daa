use regex::Regex;

/// A regex that matches nothing, used when a static pattern fails to
/// compile.
#[must_use]
pub fn never_matching_regex() -> Regex {
  Regex::new(r"[^\s\S]").unwrap_or_else(|_| {
    #[allow(clippy::unwrap_used, reason = "Both patterns are constant")]
    Regex::new(r"^\b$").unwrap()
  })
}
