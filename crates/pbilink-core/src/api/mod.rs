//! Authenticated access to the BI REST API.
//!
//! `ApiGateway` gets a valid token from the `TokenManager`, sends it as the
//! `Authorization` header on a GET, and decodes the JSON body into whatever
//! type the caller asks for. The response shapes belong to the BI service and
//! are opaque here.
//!
//! Fetches are fail-soft: `fetch` reports failure as `FetchOutcome::Empty`
//! and `fetch_typed` turns it into `T::default()`, so a broken request shows
//! up as "no data". `try_fetch` is there for callers that want the error.

pub mod error;
pub mod gateway;
pub mod http;

pub use error::FetchError;
pub use gateway::{ApiGateway, FetchOutcome};
pub use http::SharedHttpClient;
