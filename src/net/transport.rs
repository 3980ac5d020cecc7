//! Transport traits for WHOIS, HTTP and DNS queries
//!
//! [`Net`](super::Net) never talks to sockets directly. Each protocol goes
//! through one of these traits so lookups can run against canned responses.

use crate::config::NetConfig;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The query did not complete within the timeout
    #[error("timed out")]
    Timeout,
    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),
    /// A DNS resolution error (NXDOMAIN, no answer, no nameservers)
    #[error("DNS resolution failed: {0}")]
    Resolve(String),
    /// Any other I/O or protocol error
    #[error("{0}")]
    Other(String),
}

/// HTTP request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST with a url-encoded form body
    Post,
}

/// An HTTP request handed to an [`HttpTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request verb
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Form fields for POST requests
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    /// A GET request for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    /// A form POST to `url`
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            form,
        }
    }

    /// Adds a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status and body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body decoded as text
    pub body: String,
}

/// Raw WHOIS over TCP
#[async_trait]
pub trait WhoisTransport: Send + Sync + fmt::Debug {
    /// Sends `query` to `server:port` and returns everything read until EOF
    async fn query(
        &self,
        server: &str,
        port: u16,
        query: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// HTTP GET/POST
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Performs the request; non-2xx statuses are returned, not raised
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// DNS TXT and PTR queries
#[async_trait]
pub trait DnsTransport: Send + Sync + fmt::Debug {
    /// All TXT records for `name`, each joined into one string
    async fn txt(&self, name: &str) -> Result<Vec<String>, TransportError>;

    /// PTR names for `addr`, trailing dot removed
    async fn reverse(&self, addr: IpAddr) -> Result<Vec<String>, TransportError>;
}

/// WHOIS over a tokio TCP stream
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpWhoisTransport;

#[async_trait]
impl WhoisTransport for TcpWhoisTransport {
    async fn query(
        &self,
        server: &str,
        port: u16,
        query: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let mut stream = tokio::time::timeout(timeout, TcpStream::connect((server, port)))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        stream
            .write_all(query.as_bytes())
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let mut buf = Vec::new();
        tokio::time::timeout(timeout, stream.read_to_end(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// HTTP over reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client honouring the configured timeout and proxies
    pub fn new(config: &NetConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ipwhois/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = &config.proxy_http {
            builder = builder
                .proxy(reqwest::Proxy::http(proxy).map_err(|e| TransportError::Other(e.to_string()))?);
        }
        if let Some(proxy) = &config.proxy_https {
            builder = builder
                .proxy(reqwest::Proxy::https(proxy).map_err(|e| TransportError::Other(e.to_string()))?);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.form),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| map_reqwest_error(&e))?;
        Ok(HttpResponse { status, body })
    }
}

/// DNS via a hickory tokio resolver
#[derive(Debug, Clone)]
pub struct HickoryDnsTransport {
    resolver: TokioResolver,
}

impl HickoryDnsTransport {
    /// Creates a resolver against Cloudflare's public servers
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .with_options(opts)
        .build();
        Self { resolver }
    }
}

#[async_trait]
impl DnsTransport for HickoryDnsTransport {
    async fn txt(&self, name: &str) -> Result<Vec<String>, TransportError> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| TransportError::Resolve(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|record| {
                record
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .collect())
    }

    async fn reverse(&self, addr: IpAddr) -> Result<Vec<String>, TransportError> {
        let lookup = self
            .resolver
            .reverse_lookup(addr)
            .await
            .map_err(|e| TransportError::Resolve(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .collect())
    }
}
