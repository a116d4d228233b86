#![forbid(unsafe_code)]

mod client;
mod error;
mod types;
mod util;

pub use client::HttpClient;
pub use http::Method;
pub use error::{Error, Result};
pub use types::{HttpRequest, HttpResponse, StreamedResponse};
pub use util::content_range_total;
