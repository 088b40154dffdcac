use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use http::Uri;
use http::uri::{Authority, Scheme};
use tracing::debug;
use url::Url;

use super::{ApiClient, ApiClientError};
use crate::spec::Specification;

const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`ApiClient`].
///
/// The origin every HTTP request is sent to is taken, in order, from the
/// builder settings, then from the `host` and `schemes` of the specification,
/// and finally defaults to `http://127.0.0.1`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use http::uri::Scheme;
/// use opwire_core::{ApiClient, Specification};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let spec: Specification = r#"{ "basePath": "/v1", "paths": {} }"#.parse()?;
/// let client = ApiClient::builder()
///     .with_scheme(Scheme::HTTPS)
///     .with_host("api.example.com")
///     .with_port(8443)
///     .with_channel_timeout(Duration::from_secs(5))
///     .build(spec)?;
///
/// assert_eq!(client.base_uri().as_str(), "https://api.example.com:8443/");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    client: reqwest::Client,
    scheme: Option<Scheme>,
    host: Option<String>,
    port: Option<u16>,
    channel_timeout: Option<Duration>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: None,
            host: None,
            port: None,
            channel_timeout: Some(DEFAULT_CHANNEL_TIMEOUT),
        }
    }
}

impl ApiClientBuilder {
    /// Builds the client for the given specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme, host and port do not form a valid URL.
    pub fn build(self, specification: Specification) -> Result<ApiClient, ApiClientError> {
        let Self {
            client,
            scheme,
            host,
            port,
            channel_timeout,
        } = self;

        let scheme = scheme
            .or_else(|| scheme_from(specification.schemes()))
            .unwrap_or(Scheme::HTTP);
        let host = host
            .or_else(|| specification.host().map(ToString::to_string))
            .unwrap_or_else(|| IpAddr::V4(Ipv4Addr::LOCALHOST).to_string());

        let authority = host.parse::<Authority>().map_err(http::Error::from)?;
        let authority = match port {
            Some(port) => format!("{}:{port}", authority.host()),
            None => authority.to_string(),
        };

        let uri = Uri::builder()
            .scheme(scheme)
            .authority(authority)
            .path_and_query("/")
            .build()?;
        let base_uri = Url::parse(&uri.to_string())?;
        debug!(%base_uri, operations = specification.len(), "client ready");

        Ok(ApiClient::new(client, base_uri, specification, channel_timeout))
    }

    /// Uses a preconfigured HTTP client (proxies, default headers, timeouts...).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Sets the scheme, overriding the specification `schemes`.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Sets the host, overriding the specification `host`.
    ///
    /// The host may carry a port, as in `localhost:3000`.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port, replacing any port of the host.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets how long a call sent over a message channel waits for its reply.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = Some(timeout);
        self
    }

    /// Lets calls sent over a message channel wait for their reply until the
    /// channel closes.
    #[must_use]
    pub fn without_channel_timeout(mut self) -> Self {
        self.channel_timeout = None;
        self
    }
}

/// First supported scheme of the specification, `https` preferred.
fn scheme_from(schemes: &[String]) -> Option<Scheme> {
    let has = |name: &str| schemes.iter().any(|it| it.eq_ignore_ascii_case(name));
    if has("https") {
        Some(Scheme::HTTPS)
    } else if has("http") {
        Some(Scheme::HTTP)
    } else {
        None
    }
}
