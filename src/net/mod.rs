//! Network query primitives for a single address
//!
//! [`Net`] validates the address, computes its Team Cymru DNS zone and
//! exposes one method per query type. Every query goes through a
//! [`transport`] trait and the [`retry`] wrapper.

pub(crate) mod retry;
pub mod transport;

use crate::asn::Rir;
use crate::config::NetConfig;
use crate::error::{IpWhoisError, Result};
use crate::utils::ip_is_defined;
use retry::{with_retries, Failure};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
pub use transport::{
    DnsTransport, HickoryDnsTransport, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, TcpWhoisTransport, TransportError, WhoisTransport,
};

/// Team Cymru WHOIS server used for ASN lookups
pub const CYMRU_WHOIS: &str = "whois.cymru.com";

/// ARIN REST endpoint used by the HTTP ASN method
pub const ARIN_NETS_URL: &str =
    "https://whois.arin.net/rest/nets;q={0}?showDetails=true&showARIN=true&showNonArinTopLevelNet=true&ext=netref2";

/// Servers that are never queried
pub const BLACKLIST: [&str; 1] = ["root.rwhois.net"];

const WHOIS_RATE_LIMIT_BANNER: &str = "Query rate limit exceeded";

/// The set of transports a [`Net`] uses
#[derive(Debug, Clone)]
pub struct Transports {
    /// WHOIS over TCP
    pub whois: Arc<dyn WhoisTransport>,
    /// HTTP
    pub http: Arc<dyn HttpTransport>,
    /// DNS
    pub dns: Arc<dyn DnsTransport>,
}

impl Transports {
    /// The real TCP, reqwest and hickory transports
    pub fn from_config(config: &NetConfig) -> Result<Self> {
        let http = ReqwestTransport::new(config)
            .map_err(|e| IpWhoisError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            whois: Arc::new(TcpWhoisTransport),
            http: Arc::new(http),
            dns: Arc::new(HickoryDnsTransport::new(config.timeout)),
        })
    }
}

/// Reverse DNS result for an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    /// Primary PTR name
    pub hostname: String,
    /// Any further PTR names
    pub aliases: Vec<String>,
    /// The queried address
    pub addresses: Vec<String>,
}

/// Query primitives bound to one validated address
#[derive(Debug, Clone)]
pub struct Net {
    address: IpAddr,
    address_str: String,
    reversed: String,
    dns_zone: String,
    config: NetConfig,
    transports: Transports,
}

impl Net {
    /// Validates `address` and builds the real transports.
    ///
    /// # Errors
    ///
    /// [`IpWhoisError::InvalidAddress`] for unparsable input and
    /// [`IpWhoisError::IpDefined`] for special-use addresses. No network
    /// I/O happens before these checks.
    ///
    /// # Examples
    ///
    /// ```
    /// use ipwhois::{IpWhoisError, Net, NetConfig};
    ///
    /// let err = Net::new("127.0.0.1", NetConfig::default()).unwrap_err();
    /// assert!(matches!(err, IpWhoisError::IpDefined { .. }));
    /// ```
    pub fn new(address: &str, config: NetConfig) -> Result<Self> {
        let address = Self::validate_address(address)?;
        config.validate().map_err(IpWhoisError::Config)?;
        let transports = Transports::from_config(&config)?;
        Ok(Self::build(address, config, transports))
    }

    /// Validates `address` and uses the given transports.
    pub fn with_transports(address: &str, config: NetConfig, transports: Transports) -> Result<Self> {
        let address = Self::validate_address(address)?;
        config.validate().map_err(IpWhoisError::Config)?;
        Ok(Self::build(address, config, transports))
    }

    fn validate_address(address: &str) -> Result<IpAddr> {
        let addr: IpAddr = address
            .trim()
            .parse()
            .map_err(|_| IpWhoisError::InvalidAddress(address.to_string()))?;
        if let Some(info) = ip_is_defined(addr) {
            return Err(IpWhoisError::IpDefined {
                address: addr.to_string(),
                version: if addr.is_ipv4() { 4 } else { 6 },
                name: info.name.to_string(),
                rfc: info.rfc.to_string(),
            });
        }
        Ok(addr)
    }

    fn build(address: IpAddr, config: NetConfig, transports: Transports) -> Self {
        let (reversed, dns_zone) = match address {
            IpAddr::V4(v4) => {
                let reversed = v4
                    .octets()
                    .iter()
                    .rev()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                let zone = format!("{reversed}.origin.asn.cymru.com");
                (reversed, zone)
            }
            IpAddr::V6(v6) => {
                let mut groups: Vec<String> =
                    v6.segments().iter().map(|s| format!("{s:04x}")).collect();
                while groups.last().is_some_and(|g| g == "0000") {
                    groups.pop();
                }
                let reversed = groups
                    .concat()
                    .chars()
                    .rev()
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .join(".");
                let zone = format!("{reversed}.origin6.asn.cymru.com");
                (reversed, zone)
            }
        };

        Self {
            address,
            address_str: address.to_string(),
            reversed,
            dns_zone,
            config,
            transports,
        }
    }

    /// The validated address
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// The address in canonical text form
    pub fn address_str(&self) -> &str {
        &self.address_str
    }

    /// 4 or 6
    pub fn version(&self) -> u8 {
        if self.address.is_ipv4() {
            4
        } else {
            6
        }
    }

    /// Reversed octets (IPv4) or nibbles (IPv6)
    pub fn reversed(&self) -> &str {
        &self.reversed
    }

    /// Team Cymru origin zone for the address
    pub fn dns_zone(&self) -> &str {
        &self.dns_zone
    }

    /// Connection settings
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Per-query timeout
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Transports in use
    pub fn transports(&self) -> &Transports {
        &self.transports
    }

    /// TXT records for the address' Cymru origin zone.
    pub async fn get_asn_dns(&self) -> Result<Vec<String>> {
        debug!("ASN query for {}", self.dns_zone);
        let records = self
            .transports
            .dns
            .txt(&self.dns_zone)
            .await
            .map_err(|e| {
                IpWhoisError::AsnLookup(format!(
                    "ASN lookup failed (DNS {e}) for {}.",
                    self.address_str
                ))
            })?;
        if records.is_empty() {
            return Err(IpWhoisError::AsnLookup(format!(
                "ASN lookup failed (no TXT records) for {}.",
                self.address_str
            )));
        }
        Ok(records)
    }

    /// The verbose Cymru record for `asn` (`AS<asn>.asn.cymru.com`).
    pub async fn get_asn_verbose_dns(&self, asn: &str) -> Result<String> {
        let asn = asn.trim();
        let zone = if asn.to_uppercase().starts_with("AS") {
            format!("{asn}.asn.cymru.com")
        } else {
            format!("AS{asn}.asn.cymru.com")
        };
        debug!("ASN verbose query for {zone}");
        let records = self.transports.dns.txt(&zone).await.map_err(|e| {
            IpWhoisError::AsnLookup(format!("ASN lookup failed (DNS {e}) for {asn}."))
        })?;
        records.into_iter().next().ok_or_else(|| {
            IpWhoisError::AsnLookup(format!("ASN lookup failed (no TXT records) for {asn}."))
        })
    }

    /// Raw Team Cymru WHOIS response for the address.
    pub async fn get_asn_whois(&self, retry_count: u32) -> Result<String> {
        let query = format!(" -r -a -c -p -f {}\r\n", self.address_str);
        debug!("ASN query for {}", self.address_str);
        with_retries("ASN WHOIS", retry_count, self.config.rate_limit_wait, || async {
            self.transports
                .whois
                .query(CYMRU_WHOIS, 43, &query, self.config.timeout)
                .await
                .map_err(|e| Failure::Transient(e.to_string()))
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| {
                    IpWhoisError::AsnLookup(format!(
                        "ASN lookup failed ({msg}) for {}.",
                        self.address_str
                    ))
                },
                || IpWhoisError::AsnLookup(format!("ASN lookup rate limited for {}.", self.address_str)),
            )
        })
    }

    /// ARIN REST `nets` JSON for the address.
    pub async fn get_asn_http(&self, retry_count: u32) -> Result<serde_json::Value> {
        let url = ARIN_NETS_URL.replace("{0}", &self.address_str);
        debug!("ASN query for {}", self.address_str);
        self.get_http_json(&url, retry_count, self.config.rate_limit_wait, "application/json")
            .await
            .map_err(|e| {
                IpWhoisError::AsnLookup(format!(
                    "ASN lookup failed ({e}) for {}.",
                    self.address_str
                ))
            })
    }

    /// Raw legacy WHOIS response.
    ///
    /// With `server` unset the registry's server is used. ARIN gets the
    /// `n + <ip>` network query.
    pub async fn get_whois(
        &self,
        registry: Option<Rir>,
        server: Option<&str>,
        port: u16,
        retry_count: u32,
        extra_blacklist: &[String],
    ) -> Result<String> {
        let server = match (server, registry) {
            (Some(server), _) => server.to_string(),
            (None, Some(rir)) => rir.whois_server().to_string(),
            (None, None) => {
                return Err(IpWhoisError::Config(
                    "a WHOIS server or registry is required".to_string(),
                ))
            }
        };

        if BLACKLIST.contains(&server.as_str()) || extra_blacklist.iter().any(|s| *s == server) {
            return Err(IpWhoisError::Blacklist(server));
        }

        let query = if registry == Some(Rir::Arin) {
            format!("n + {}\r\n", self.address_str)
        } else {
            format!("{}\r\n", self.address_str)
        };
        debug!("WHOIS query for {} at {server}:{port}", self.address_str);

        with_retries("WHOIS", retry_count, self.config.rate_limit_wait, || async {
            let response = self
                .transports
                .whois
                .query(&server, port, &query, self.config.timeout)
                .await
                .map_err(|e| Failure::Transient(e.to_string()))?;

            if response.contains(WHOIS_RATE_LIMIT_BANNER) {
                return Err(Failure::RateLimited);
            }
            if response.contains("error 501") || response.contains("error 230") {
                debug!("WHOIS query error: {response}");
                return Err(Failure::Fatal(IpWhoisError::WhoisLookup(format!(
                    "{} (query error)",
                    self.address_str
                ))));
            }
            Ok(response)
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::WhoisLookup(format!("{} ({msg})", self.address_str)),
                || IpWhoisError::WhoisRateLimit(self.address_str.clone()),
            )
        })
    }

    /// GETs `url` and parses the body as JSON.
    ///
    /// HTTP 429 (or an RDAP `errorCode` of 429) sleeps `rate_limit_timeout`
    /// and retries.
    pub async fn get_http_json(
        &self,
        url: &str,
        retry_count: u32,
        rate_limit_timeout: Duration,
        accept: &str,
    ) -> Result<serde_json::Value> {
        debug!("HTTP query for {} at {url}", self.address_str);
        with_retries("HTTP", retry_count, rate_limit_timeout, || async {
            let request = HttpRequest::get(url).header("Accept", accept);
            let response = self
                .transports
                .http
                .fetch(request)
                .await
                .map_err(|e| Failure::Transient(e.to_string()))?;

            if response.status == 429 {
                return Err(Failure::RateLimited);
            }
            let parsed = serde_json::from_str::<serde_json::Value>(&response.body);
            if let Ok(json) = &parsed {
                if json.get("errorCode").and_then(serde_json::Value::as_u64) == Some(429) {
                    return Err(Failure::RateLimited);
                }
            }
            if !(200..300).contains(&response.status) {
                return Err(Failure::Fatal(IpWhoisError::HttpLookup(format!(
                    "{url} (HTTP {})",
                    response.status
                ))));
            }
            parsed.map_err(|e| Failure::Fatal(IpWhoisError::HttpLookup(format!("{url} ({e})"))))
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::HttpLookup(format!("{url} ({msg})")),
                || IpWhoisError::HttpRateLimit(url.to_string()),
            )
        })
    }

    /// Performs `request` and returns the body as text.
    pub async fn get_http_raw(&self, request: HttpRequest, retry_count: u32) -> Result<String> {
        let url = request.url.clone();
        debug!("HTTP query for {} at {url}", self.address_str);
        with_retries("HTTP", retry_count, self.config.rate_limit_wait, || async {
            let response = self
                .transports
                .http
                .fetch(request.clone())
                .await
                .map_err(|e| Failure::Transient(e.to_string()))?;
            if response.status == 429 {
                return Err(Failure::RateLimited);
            }
            if !(200..300).contains(&response.status) {
                return Err(Failure::Fatal(IpWhoisError::HttpLookup(format!(
                    "{url} (HTTP {})",
                    response.status
                ))));
            }
            Ok(response.body)
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::HttpLookup(format!("{url} ({msg})")),
                || IpWhoisError::HttpRateLimit(url.clone()),
            )
        })
    }

    /// Reverse DNS for the address.
    pub async fn get_host(&self, retry_count: u32) -> Result<HostInfo> {
        debug!("Host query for {}", self.address_str);
        let names = with_retries("Host", retry_count, self.config.rate_limit_wait, || async {
            match self.transports.dns.reverse(self.address).await {
                Ok(names) => Ok(names),
                Err(TransportError::Timeout) => Err(Failure::Transient("timed out".to_string())),
                Err(e) => Err(Failure::Fatal(IpWhoisError::HostLookup(format!(
                    "{} ({e})",
                    self.address_str
                )))),
            }
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::HostLookup(format!("{} ({msg})", self.address_str)),
                || IpWhoisError::HostLookup(self.address_str.clone()),
            )
        })?;

        let mut names = names.into_iter();
        let hostname = names
            .next()
            .ok_or_else(|| IpWhoisError::HostLookup(self.address_str.clone()))?;
        Ok(HostInfo {
            hostname,
            aliases: names.collect(),
            addresses: vec![self.address_str.clone()],
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Canned transports shared by unit tests

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued results and records every query it sees
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedWhois {
        pub responses: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
        pub queries: Mutex<Vec<(String, u16, String)>>,
    }

    impl ScriptedWhois {
        pub(crate) fn new(
            responses: Vec<std::result::Result<String, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.queries.lock().expect("queries lock").len()
        }
    }

    #[async_trait]
    impl WhoisTransport for ScriptedWhois {
        async fn query(
            &self,
            server: &str,
            port: u16,
            query: &str,
            _timeout: Duration,
        ) -> std::result::Result<String, TransportError> {
            self.queries
                .lock()
                .expect("queries lock")
                .push((server.to_string(), port, query.to_string()));
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    /// Replays queued HTTP results
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedHttp {
        pub responses: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        pub(crate) fn new(
            responses: Vec<std::result::Result<HttpResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn ok(status: u16, body: &str) -> std::result::Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedHttp {
        async fn fetch(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().expect("requests lock").push(request);
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    /// Answers TXT queries from a fixed table
    #[derive(Debug, Default)]
    pub(crate) struct TableDns {
        pub txt: Vec<(String, Vec<String>)>,
        pub ptr: Vec<String>,
    }

    #[async_trait]
    impl DnsTransport for TableDns {
        async fn txt(&self, name: &str) -> std::result::Result<Vec<String>, TransportError> {
            self.txt
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, records)| records.clone())
                .ok_or_else(|| TransportError::Resolve(format!("NXDOMAIN {name}")))
        }

        async fn reverse(&self, _addr: IpAddr) -> std::result::Result<Vec<String>, TransportError> {
            if self.ptr.is_empty() {
                Err(TransportError::Resolve("NXDOMAIN".to_string()))
            } else {
                Ok(self.ptr.clone())
            }
        }
    }

    pub(crate) fn fast_config() -> NetConfig {
        NetConfig::builder()
            .timeout(Duration::from_millis(200))
            .rate_limit_wait(Duration::from_millis(1))
            .build()
            .expect("valid config")
    }

    pub(crate) fn net_with(
        address: &str,
        whois: Arc<dyn WhoisTransport>,
        http: Arc<dyn HttpTransport>,
        dns: Arc<dyn DnsTransport>,
    ) -> Net {
        Net::with_transports(address, fast_config(), Transports { whois, http, dns })
            .expect("valid address")
    }
}
