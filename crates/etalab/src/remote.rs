//! HTTP plumbing shared by the prediction and training-sync clients.
//!
//! Both talk to the same kind of JSON service: a `GET /health` liveness
//! probe plus JSON endpoints that report failures as `{"detail": "..."}`.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const HEALTH_PATH: &str = "health";

/// A JSON service at a base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    health_timeout: Duration,
}

impl ServiceClient {
    /// Create a client for `base_url`.
    ///
    /// `request_timeout` bounds every call; `health_timeout` bounds the
    /// liveness probe only.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, request_timeout: Duration, health_timeout: Duration) -> Result<Self> {
        let mut url = Url::parse(base_url).map_err(|e| Error::ConfigValidation {
            message: format!("invalid service URL {base_url}: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigValidation {
                message: format!("service URL must use http or https: {base_url}"),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: url,
            health_timeout,
        })
    }

    /// The normalised base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::internal(format!("cannot join {path} to {}: {e}", self.base_url)))
    }

    /// Probe `GET /health`. Any failure, including a timeout, reads as
    /// "not healthy".
    pub async fn check_health(&self) -> bool {
        let url = match self.endpoint(HEALTH_PATH) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.http.get(url).timeout(self.health_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, base_url = %self.base_url, "Health probe failed");
                false
            }
        }
    }

    /// Like [`check_health`](Self::check_health), but an unhealthy service
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`].
    pub async fn require_healthy(&self) -> Result<()> {
        if self.check_health().await {
            Ok(())
        } else {
            Err(Error::ServiceUnavailable {
                url: self.base_url.to_string(),
            })
        }
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status or a body
    /// that does not decode.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// `POST path` with an optional JSON body and decode the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status or a body
    /// that does not decode.
    pub async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into [`Error::Api`], preferring the `detail`
/// field of a JSON error body.
async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, detail) = etalab_pinn::api_failure(response).await;
    Err(Error::Api { status, detail })
}
