//! A small curl-like HTTP client: fetch one URL and write the body to a file
//! or stdout.

pub mod doc;
pub mod fetcher;
pub mod headers;
pub mod http;
pub mod output;
