//! # almanac-dom
//!
//! DOM normalization for offline copies of plant and zombie wiki pages.
//!
//! A page goes through the [`Cleaner`]: site chrome and noise sections are
//! dropped, internal links are pointed at local page files by the
//! [`LinkRewriter`], the infobox is read into [`InfoboxData`], and the
//! almanac section is rebuilt as a fixed three-column block by the
//! [`AlmanacSynthesizer`]. Image localization is not part of this crate; it
//! runs over the cleaned output afterwards.
//!
//! ```rust
//! use almanac_dom::{Cleaner, ContentType};
//!
//! let cleaner = Cleaner::default();
//! let cleaned = cleaner
//!   .clean_html(
//!     r#"<div id="mw-content-text"><p>豌豆射手</p></div>"#,
//!     ContentType::Plants,
//!   )
//!   .expect("page has a content root");
//!
//! assert!(cleaned.main_html.contains("reorganized-almanac"));
//! assert!(cleaned.sidebar_html.is_empty());
//! ```

pub mod almanac;
pub mod cleaner;
pub mod dom;
mod error;
pub mod infobox;
pub mod links;
pub mod sidebar;
mod types;

pub use crate::{
  almanac::{AlmanacBlock, AlmanacShape, AlmanacSynthesizer},
  cleaner::{CleanOptions, CleanReport, Cleaner},
  error::CleanError,
  infobox::{Fields, ImageRef, InfoboxData},
  links::{LinkRewriter, page_filename, page_filename_from_url},
  types::{CleanedContent, ContentType},
};
