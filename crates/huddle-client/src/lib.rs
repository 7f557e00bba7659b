//! HTTP client for the Huddle API, plus the list processing a message view
//! needs: cursor paging, date buckets and compact grouping.

pub mod client;
pub mod error;
pub mod feed;
pub mod pager;
pub mod upload;

pub use client::Client;
pub use error::{Error, Result};
