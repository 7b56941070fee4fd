//! Tests for the HTTP services against a local mock server


use crate::config::ServiceEndpoints;

/// Endpoints with every service pointed at `uri`
pub fn endpoints_for(uri: &str) -> ServiceEndpoints {
    ServiceEndpoints::new(uri, uri, uri).unwrap()
}
