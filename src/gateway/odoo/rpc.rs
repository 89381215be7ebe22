//! JSON-RPC 2.0 transport.
//!
//! This is the only place where payloads are untyped JSON; callers pass
//! serializable argument structs and get typed results back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppError, Result};

#[derive(Serialize)]
struct Envelope<'a, A> {
    jsonrpc: &'static str,
    method: &'static str,
    params: ServiceCall<'a, A>,
    id: u64,
}

#[derive(Serialize)]
struct ServiceCall<'a, A> {
    service: &'a str,
    method: &'a str,
    args: A,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<Fault>,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<FaultData>,
}

#[derive(Debug, Deserialize)]
struct FaultData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl Fault {
    fn into_error(self) -> AppError {
        let (name, detail) = self
            .data
            .map(|d| (d.name, d.message))
            .unwrap_or_default();
        let text = if detail.is_empty() {
            format!("{} (code {})", self.message, self.code)
        } else {
            format!("{}: {detail} (code {})", self.message, self.code)
        };
        if name.contains("AccessDenied") || name.contains("AccessError") {
            AppError::Unauthorized(text)
        } else if name.contains("MissingError") {
            AppError::NotFound(text)
        } else {
            AppError::Tracker(text)
        }
    }
}

/// HTTP JSON-RPC client for a single endpoint.
pub struct JsonRpcTransport {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Build a transport posting to `<base_url>/jsonrpc`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/jsonrpc", base_url.trim_end_matches('/')),
            next_id: AtomicU64::new(1),
        })
    }

    /// Invoke `service.method(args)` and decode the result into `R`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transient` on transport failure or non-success
    /// HTTP status, `AppError::Unauthorized`/`NotFound`/`Tracker` for server
    /// faults, and `AppError::Parse` when the result does not fit `R`.
    pub async fn call<A, R>(&self, service: &str, method: &str, args: A) -> Result<R>
    where
        A: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope {
            jsonrpc: "2.0",
            method: "call",
            params: ServiceCall {
                service,
                method,
                args,
            },
            id,
        };

        let response = self.http.post(&self.endpoint).json(&envelope).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transient(format!(
                "rpc {service}.{method} returned http {status}"
            )));
        }

        let body: Response = response.json().await?;
        if let Some(fault) = body.error {
            debug!(service, method, ?fault, "rpc fault");
            return Err(fault.into_error());
        }
        let result = body.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result)
            .map_err(|err| AppError::Parse(format!("rpc {service}.{method} result: {err}")))
    }
}
