// Request descriptor: one immutable record per logical backend operation

use reqwest::Method;
use serde_json::Value;

/// Everything needed to issue one backend request.
///
/// Built once by the gateway and never mutated after submission; a
/// retried attempt replays the same descriptor.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    pub fn with_json(method: Method, url: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            url: url.into(),
            body: Some(body),
        }
    }
}
