//! Content-addressed image cache for offline almanac pages.
//!
//! Remote images are downloaded once into an images directory and stored
//! under a filename derived from their URL. Byte-identical images served
//! from different URLs share one file. Two JSON maps next to the images,
//! URL to filename and content hash to filename, carry the cache across
//! runs.
pub mod cache;
mod error;
pub mod filename;
pub mod rewrite;
pub mod source;
pub mod store;
pub mod utils;

pub use crate::{
  cache::{
    CONTENT_HASH_FILE,
    CacheOptions,
    DownloadStats,
    ImageCache,
    URL_MAPPING_FILE,
  },
  error::{FetchError, ImageError},
  rewrite::{Substitutions, image_base_url},
  source::{FetchedImage, HttpSource, ImageSource},
};
