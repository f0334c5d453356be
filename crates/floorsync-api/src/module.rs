// Module state HTTP client
//
// Wraps `reqwest::Client` with the server's URL layout. The feed delivers
// state changes; these endpoints only trigger refreshes, issue commands,
// and report the server clock.

use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the module state server.
///
/// Module addresses are passed in their canonical hex form; encoding is the
/// caller's concern so that every path segment comes from the same codec.
pub struct ModuleClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ModuleClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `http://192.168.1.20:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /timestamp`: the server's current epoch time in seconds.
    ///
    /// The body is plain text holding a float. Anything else is reported
    /// as [`Error::Deserialization`].
    pub async fn server_timestamp(&self) -> Result<f64, Error> {
        let url = self.base_url.join("/timestamp")?;
        debug!(url = %url, "fetching server timestamp");

        let resp = self.http.get(url).send().await?;
        let body = Self::checked_body(resp, "/timestamp").await?;

        match body.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() => Ok(secs),
            Ok(_) | Err(_) => Err(Error::Deserialization {
                message: "timestamp is not a finite number".into(),
                body,
            }),
        }
    }

    /// `GET /module/<hex>/<subindex>/<field>`.
    ///
    /// Asks the server to (re)read a sub-unit. The same value is pushed over
    /// the feed, so callers usually ignore the returned body. An empty body
    /// yields `Value::Null`.
    pub async fn get_state(
        &self,
        address_hex: &str,
        subindex: u32,
        field: &str,
    ) -> Result<Value, Error> {
        let path = module_path(address_hex, subindex, field);
        let url = self.base_url.join(&path)?;
        debug!(url = %url, "GET module state");

        let resp = self.http.get(url).send().await?;
        let body = Self::checked_body(resp, &path).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// `PUT /module/<hex>/<subindex>/<field>` with a bare JSON scalar body.
    pub async fn put_state(
        &self,
        address_hex: &str,
        subindex: u32,
        field: &str,
        value: &Value,
    ) -> Result<(), Error> {
        let path = module_path(address_hex, subindex, field);
        let url = self.base_url.join(&path)?;
        let body = value.to_string();
        debug!(url = %url, body = %body, "PUT module state");

        let resp = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        Self::checked_body(resp, &path).await?;
        Ok(())
    }

    // ── Response handling ────────────────────────────────────────────

    async fn checked_body(resp: reqwest::Response, path: &str) -> Result<String, Error> {
        let status = resp.status();
        trace!(status = status.as_u16(), path, "response received");
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                path: path.to_owned(),
            });
        }
        Ok(resp.text().await?)
    }
}

fn module_path(address_hex: &str, subindex: u32, field: &str) -> String {
    format!("/module/{address_hex}/{subindex}/{field}")
}
