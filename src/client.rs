//! HTTP transport for the Frappe client
//!
//! Owns the pooled hyper client, the TLS setup and the fixed credential
//! header. Operations live in [`crate::documents`] and [`crate::bulk`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;
use zeroize::Zeroize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::response::normalize;

/// Unreserved characters per RFC 3986; everything else in a doctype or
/// document name is percent-encoded, `/` included.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a doctype or document name for use as one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// `Authorization` header value, zeroed on drop.
struct AuthHeader(String);

impl AuthHeader {
    fn basic(api_key: &str, api_secret: &str) -> Self {
        let mut pair = format!("{}:{}", api_key, api_secret);
        let token = base64::engine::general_purpose::STANDARD.encode(pair.as_bytes());
        pair.zeroize();
        Self(format!("Basic {}", token))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for AuthHeader {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// `verify_ssl = false`: any certificate chain is taken as trusted. Handshake
/// signatures are still checked so the session keys stay bound to the peer.
#[derive(Debug)]
struct AcceptAnyCert {
    algorithms: WebPkiSupportedAlgorithms,
}

type SignatureResult = std::result::Result<HandshakeSignatureValid, rustls::Error>;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> SignatureResult {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> SignatureResult {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Build the rustls config: webpki roots, or no verification at all.
fn build_tls_config(verify_ssl: bool) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?;

    if verify_ssl {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Ok(builder.with_root_certificates(roots).with_no_client_auth())
    } else {
        Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert {
                algorithms: provider.signature_verification_algorithms,
            }))
            .with_no_client_auth())
    }
}

/// Validate the base URL and strip any trailing slash.
fn parse_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("Invalid base URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidUrl(format!(
                "Unsupported scheme '{}', expected http or https",
                other
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("Base URL '{}' has no host", raw)));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Request body variants used by the API
#[derive(Debug)]
pub(crate) enum Body {
    Empty,
    Json(Value),
    Form(Vec<(&'static str, String)>),
}

/// Async client for a Frappe site
///
/// Cloning is cheap: clones share the connection pool, the credentials and
/// the bulk concurrency limit.
///
/// # Example
/// ```rust,no_run
/// use frappe_client::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), frappe_client::Error> {
///     // Unauthenticated session
///     let client = Client::new("https://erp.example.com")?;
///
///     // API key + secret
///     let client = Client::with_credentials("https://erp.example.com", "key", "secret")?;
///
///     // Self-signed certificate
///     let client = Client::with_config(ClientConfig {
///         url: "https://erp.internal".to_string(),
///         verify_ssl: false,
///         ..Default::default()
///     })?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    base_url: Arc<str>,
    auth: Option<Arc<AuthHeader>>,
    http_client: HttpClient<HttpsConnector, Full<Bytes>>,
    permits: Option<Arc<Semaphore>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.base_url)
            .field("authenticated", &self.auth.is_some())
            .field("verify_ssl", &self.config.verify_ssl)
            .finish()
    }
}

impl Client {
    /// Create an unauthenticated client for `url`
    ///
    /// # Errors
    /// Returns an error if the URL is invalid
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(ClientConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Create a client authenticated with an API key and secret
    pub fn with_credentials(url: &str, api_key: &str, api_secret: &str) -> Result<Self> {
        Self::with_config(ClientConfig {
            url: url.to_string(),
            api_key: Some(api_key.to_string()),
            api_secret: Some(api_secret.to_string()),
            ..Default::default()
        })
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.url)?;

        let auth = match (config.api_key.as_deref(), config.api_secret.as_deref()) {
            (Some(key), Some(secret)) => Some(Arc::new(AuthHeader::basic(key, secret))),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidArgument(
                    "api_key and api_secret must be given together".to_string(),
                ))
            }
        };

        let tls_config = build_tls_config(config.verify_ssl)?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let http_client = HttpClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(https_connector);

        let permits = match config.max_concurrent_requests {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Ok(Self {
            config: Arc::new(config),
            base_url: base_url.into(),
            auth,
            http_client,
            permits,
        })
    }

    /// Base URL of the site, without a trailing slash
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry an `Authorization` header
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// The configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn permits(&self) -> Option<&Arc<Semaphore>> {
        self.permits.as_ref()
    }

    /// Build the full request URI for `path` plus query parameters
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Uri> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url.as_str()
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL: {}", e)))
    }

    /// Send one request and normalize its envelope
    pub(crate) async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Body,
    ) -> Result<Option<Value>> {
        let (_, payload) = self.call_with_status(method, path, query, body).await?;
        Ok(payload)
    }

    /// Like [`Client::call`], keeping the status for payload diagnostics
    pub(crate) async fn call_with_status(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Body,
    ) -> Result<(StatusCode, Option<Value>)> {
        let (status, bytes) = self.send(method, path, query, body).await?;
        Ok((status, normalize(status, &bytes)?))
    }

    /// Internal request method; returns the status and the full body
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Body,
    ) -> Result<(StatusCode, Bytes)> {
        let uri = self.endpoint(path, query)?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(header::ACCEPT, "application/json");

        if let Some(auth) = &self.auth {
            builder = builder.header(header::AUTHORIZATION, auth.as_str());
        }

        let payload = match body {
            Body::Empty => Bytes::new(),
            Body::Json(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Bytes::from(serde_json::to_vec(&value)?)
            }
            Body::Form(fields) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter().map(|(k, v)| (*k, v.as_str())))
                    .finish();
                Bytes::from(encoded)
            }
        };

        let req = builder
            .body(Full::new(payload))
            .map_err(|e| Error::InvalidArgument(format!("Failed to build request: {}", e)))?;

        debug!("Sending request: {} {}", method, path);

        let exchange = async {
            let response = self
                .http_client
                .request(req)
                .await
                .map_err(|e| Error::Transport(format!("Request failed: {}", e)))?;
            let status = response.status();
            let collected = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Transport(format!("Failed to read body: {}", e)))?;
            Ok::<_, Error>((status, collected.to_bytes()))
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let (status, bytes) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(self.config.timeout_ms))??;

        debug!("{} {} -> {}", method, path, status);
        Ok((status, bytes))
    }
}
