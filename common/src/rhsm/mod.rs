// RHSM client: a bounded worker pool issuing retried HTTP requests
// against the subscription management backend, with future-based
// result composition.

pub mod client;
pub mod executor;
pub mod future;
pub mod request;

pub use client::{ImageMetadata, RhsmClient, RhsmClientConfig, DEFAULT_REQUEST_THREADS};
pub use executor::{RequestExecutor, SessionOptions};
pub use future::{check_status, RequestFuture};
pub use request::RequestDescriptor;
