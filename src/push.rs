use crate::config::GatewayConfig;
use crate::error::DbpushError;
use crate::masking::redact_url;
use crate::metrics::Payload;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const MAX_ERROR_BODY: usize = 512;

/// `<base>/metrics/job/<job>/instance/<instance>`, with trailing slashes on
/// the base trimmed and both keys percent-encoded as path segments.
pub fn grouping_url(base: &Url, job: &str, instance: &str) -> Result<Url, DbpushError> {
    let mut trimmed = base.clone();
    trimmed.set_query(None);
    trimmed.set_fragment(None);

    let mut url = Url::parse(trimmed.as_str().trim_end_matches('/')).map_err(|e| {
        DbpushError::Config {
            message: format!("PUSHGATEWAY_URL is not a valid URL: {}", e),
        }
    })?;

    url.path_segments_mut()
        .map_err(|_| DbpushError::Config {
            message: format!("PUSHGATEWAY_URL cannot carry a path: {}", base),
        })?
        .pop_if_empty()
        .extend(["metrics", "job", job, "instance", instance]);

    Ok(url)
}

/// The client is built before any query runs; setup failures are config errors.
fn client_setup_error(e: reqwest::Error) -> DbpushError {
    DbpushError::Config {
        message: format!("cannot build HTTP client for PUSHGATEWAY_URL: {}", e),
    }
}

/// Sends one payload to a PushGateway grouping key.
pub struct PushClient {
    client: Client,
    endpoint: Url,
    /// Endpoint with any URL password masked, for messages.
    display_endpoint: String,
    auth: Option<(String, SecretString)>,
}

impl PushClient {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, DbpushError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(gateway.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(client_setup_error)?;

        let auth = gateway.auth.as_ref().map(|a| {
            (
                a.username.clone(),
                SecretString::from(a.password.expose_secret().to_string()),
            )
        });

        let endpoint = grouping_url(&gateway.url, &gateway.job, &gateway.instance)?;
        let display_endpoint = redact_url(&endpoint, false);

        Ok(Self {
            client,
            endpoint,
            display_endpoint,
            auth,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn display_endpoint(&self) -> &str {
        &self.display_endpoint
    }

    /// PUT the whole payload, replacing every metric under the grouping key.
    pub async fn push(&self, payload: &Payload) -> Result<(), DbpushError> {
        let mut request = self
            .client
            .put(self.endpoint.clone())
            .header(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)
            .body(payload.render());

        if let Some((username, password)) = &self.auth {
            request = request.basic_auth(username, Some(password.expose_secret()));
        }

        let resp = request.send().await.map_err(|e| DbpushError::Push {
            message: if e.is_timeout() {
                format!("request to {} timed out", self.display_endpoint)
            } else {
                format!("request to {} failed: {}", self.display_endpoint, e.without_url())
            },
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DbpushError::Push {
                message: format!(
                    "gateway returned HTTP {}: {}",
                    status.as_u16(),
                    truncate(body.trim(), MAX_ERROR_BODY)
                ),
            });
        }

        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
