//! Centralized error handling for the room crawler
//!
//! Every fallible operation in the library returns [`AppResult`], whose error
//! side is the single [`CrawlerError`] taxonomy.
//!
//! # Error Categories
//!
//! - **Fatal**: configuration, authentication, parse and filesystem errors abort
//!   the run with a diagnostic naming the (redacted) URL or path involved.
//! - **Request failures**: HTTP non-success and transport errors. Fatal in
//!   general, but downgraded to an end-of-listing signal while paginating.
//! - **Locally recovered**: image decode and avatar fetch errors never leave the
//!   avatar normalizer.
//!
//! # Usage
//!
//! ```rust
//! use matrix_room_crawler::errors::{AppResult, CrawlerError};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(CrawlerError::auth("login returned no access_token"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using CrawlerError
pub type AppResult<T> = Result<T, CrawlerError>;
