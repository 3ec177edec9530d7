//! HTTP transport for XML-RPC calls.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::rpc::codec::{decode_response, encode_call};
use crate::rpc::error::{RpcError, RpcResult};

/// Path the Python XML-RPC server answers on.
pub const RPC_PATH: &str = "/RPC2";

/// Default port of the FreeCAD addon's RPC listener.
pub const DEFAULT_PORT: u16 = 9875;

/// Anything that can invoke a remote method by name.
///
/// This is the seam between the tool layer and the wire. Tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait RpcCaller: Send + Sync {
    /// Calls `method` with positional `params` and returns the decoded result.
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value>;
}

/// Where the RPC listener lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the full URL of the XML-RPC handler.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}{RPC_PATH}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// XML-RPC client over HTTP POST.
pub struct XmlRpcClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl XmlRpcClient {
    /// Creates a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: Endpoint, timeout: Duration) -> RpcResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Returns the endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl RpcCaller for XmlRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let body = encode_call(method, &params);
        tracing::debug!(method, endpoint = %self.endpoint, bytes = body.len(), "XML-RPC call");

        let response = self
            .http
            .post(self.endpoint.url())
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        decode_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url() {
        let endpoint = Endpoint::new("localhost", DEFAULT_PORT);
        assert_eq!(endpoint.url(), "http://localhost:9875/RPC2");
        assert_eq!(endpoint.to_string(), "localhost:9875");
    }

    #[test]
    fn client_builds_without_network() {
        let client = XmlRpcClient::new(Endpoint::new("127.0.0.1", 1), Duration::from_secs(1));
        assert!(client.is_ok());
    }
}
