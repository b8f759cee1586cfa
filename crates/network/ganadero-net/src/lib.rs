//! Ganadero Net - the network boundary of the offline worker
//!
//! - [`Fetcher`]: the one trait every outbound request goes through, with a
//!   `reqwest` implementation in [`HttpFetcher`].
//! - [`UrlResolver`]: absolute URLs for page-relative paths and API detection.
//! - [`ConnectivityMonitor`]: online/offline tracking from a health probe.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod error;
pub mod fetcher;
pub mod resolver;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use connectivity::{ConnectivityMonitor, NetworkState, Transition};
pub use error::{FetchError, FetchResult};
pub use fetcher::{Fetcher, HttpFetcher, HttpFetcherConfig};
pub use resolver::UrlResolver;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockFetcher, Reply};
