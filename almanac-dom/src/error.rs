use thiserror::Error;

/// Hard failures of the normalization engine.
///
/// Missing structure (no infobox, no almanac section, no title) is never an
/// error; those steps fall back to empty or unchanged output. Only input that
/// cannot be worked on at all is reported.
#[derive(Debug, Error)]
pub enum CleanError {
  #[error("Document is empty")]
  EmptyDocument,

  #[error("No content root matched any of: {0}")]
  MissingContentRoot(String),

  #[error("Unknown content type: {0}")]
  UnknownContentType(String),

  #[error("Normalization aborted: {0}")]
  Aborted(String),
}
