//! Expose almanac's internal API for use in integration tests. It is not a
//! stable interface.
pub mod cli;
pub mod error;
pub mod fetch;
pub mod index;
pub mod metadata;
pub mod output;
pub mod scrape;
