//! Configuration types for network queries and lookups

pub mod timing;

use crate::nir::NirField;
use crate::whois::WhoisField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// ASN resolution method, tried in the order given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsnMethod {
    /// Team Cymru DNS TXT records
    Dns,
    /// Team Cymru WHOIS on port 43
    Whois,
    /// ARIN REST over HTTP
    Http,
}

impl AsnMethod {
    /// Default resolution order
    pub const DEFAULT_ORDER: [AsnMethod; 3] = [AsnMethod::Dns, AsnMethod::Whois, AsnMethod::Http];

    /// Lowercase method name
    pub fn as_str(self) -> &'static str {
        match self {
            AsnMethod::Dns => "dns",
            AsnMethod::Whois => "whois",
            AsnMethod::Http => "http",
        }
    }
}

impl fmt::Display for AsnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsnMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dns" => Ok(AsnMethod::Dns),
            "whois" => Ok(AsnMethod::Whois),
            "http" => Ok(AsnMethod::Http),
            other => Err(format!("unknown ASN method: {other}")),
        }
    }
}

/// Connection settings shared by every query an address makes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Timeout for socket connections and HTTP requests
    pub timeout: Duration,
    /// Proxy used for `http://` URLs
    pub proxy_http: Option<String>,
    /// Proxy used for `https://` URLs
    pub proxy_https: Option<String>,
    /// Allow ASN resolution to fall through to the next method
    /// when no explicit method list is given
    pub allow_permutations: bool,
    /// Pause after a WHOIS server reports its rate limit
    pub rate_limit_wait: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: timing::timeout(),
            proxy_http: None,
            proxy_https: None,
            allow_permutations: true,
            rate_limit_wait: timing::whois_rate_limit_wait(),
        }
    }
}

impl NetConfig {
    /// Create a new NetConfig builder
    pub fn builder() -> NetConfigBuilder {
        NetConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        for proxy in [&self.proxy_http, &self.proxy_https].into_iter().flatten() {
            if proxy.trim().is_empty() {
                return Err("proxy URL must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Builder for NetConfig
pub struct NetConfigBuilder {
    config: NetConfig,
}

impl NetConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: NetConfig::default(),
        }
    }

    /// Set the query timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the proxy for `http://` URLs
    pub fn proxy_http(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy_http = Some(proxy.into());
        self
    }

    /// Set the proxy for `https://` URLs
    pub fn proxy_https(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy_https = Some(proxy.into());
        self
    }

    /// Allow or forbid falling through ASN methods
    pub fn allow_permutations(mut self, allow: bool) -> Self {
        self.config.allow_permutations = allow;
        self
    }

    /// Set the pause after a WHOIS rate-limit banner
    pub fn rate_limit_wait(mut self, wait: Duration) -> Self {
        self.config.rate_limit_wait = wait;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<NetConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for NetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options controlling a WHOIS or RDAP lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupOptions {
    /// Keep raw responses in the result
    pub inc_raw: bool,
    /// Retries for each failed query
    pub retry_count: u32,
    /// Explicit ASN method order; `None` uses the default order
    pub asn_methods: Option<Vec<AsnMethod>>,
    /// Extra ARIN org handle to registry mappings for the HTTP method
    pub extra_org_map: HashMap<String, String>,
    /// Fetch the ASN description after a DNS success
    pub get_asn_description: bool,
    /// Query JPNIC/KRNIC for addresses in Japan/Korea
    pub inc_nir: bool,
    /// Restrict NIR parsing to these fields
    pub nir_field_list: Option<Vec<NirField>>,
    /// Follow RWhois referral servers (WHOIS lookups)
    pub get_referral: bool,
    /// Servers never to query, in addition to the built-in list
    pub extra_blacklist: Vec<String>,
    /// Swallow errors from referral servers
    pub ignore_referral_errors: bool,
    /// Restrict WHOIS parsing to these fields
    pub field_list: Option<Vec<WhoisField>>,
    /// Levels of RDAP sub-entities to fetch (RDAP lookups)
    pub depth: u32,
    /// RDAP entity handles never to fetch
    pub excluded_entities: Vec<String>,
    /// Skip ASN resolution and query the ARIN RDAP bootstrap
    pub bootstrap: bool,
    /// Pause after an RDAP HTTP 429
    pub rate_limit_timeout: Duration,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            inc_raw: false,
            retry_count: timing::DEFAULT_RETRY_COUNT,
            asn_methods: None,
            extra_org_map: HashMap::new(),
            get_asn_description: true,
            inc_nir: true,
            nir_field_list: None,
            get_referral: false,
            extra_blacklist: Vec::new(),
            ignore_referral_errors: false,
            field_list: None,
            depth: 0,
            excluded_entities: Vec::new(),
            bootstrap: false,
            rate_limit_timeout: timing::rdap_rate_limit_timeout(),
        }
    }
}

impl LookupOptions {
    /// Create a new LookupOptions builder
    pub fn builder() -> LookupOptionsBuilder {
        LookupOptionsBuilder::new()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), String> {
        if let Some(methods) = &self.asn_methods {
            if methods.is_empty() {
                return Err(
                    "methods argument requires at least one of dns, whois, http.".to_string(),
                );
            }
        }
        Ok(())
    }

    /// ASN methods in the order they will be tried
    pub fn asn_method_order(&self) -> Vec<AsnMethod> {
        self.asn_methods
            .clone()
            .unwrap_or_else(|| AsnMethod::DEFAULT_ORDER.to_vec())
    }
}

/// Builder for LookupOptions
pub struct LookupOptionsBuilder {
    options: LookupOptions,
}

impl LookupOptionsBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            options: LookupOptions::default(),
        }
    }

    /// Keep raw responses
    pub fn inc_raw(mut self, inc_raw: bool) -> Self {
        self.options.inc_raw = inc_raw;
        self
    }

    /// Set the retry count
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.options.retry_count = retry_count;
        self
    }

    /// Set an explicit ASN method order
    pub fn asn_methods(mut self, methods: Vec<AsnMethod>) -> Self {
        self.options.asn_methods = Some(methods);
        self
    }

    /// Add ARIN org handle mappings
    pub fn extra_org_map(mut self, map: HashMap<String, String>) -> Self {
        self.options.extra_org_map = map;
        self
    }

    /// Enable or disable the ASN description query
    pub fn get_asn_description(mut self, enable: bool) -> Self {
        self.options.get_asn_description = enable;
        self
    }

    /// Enable or disable NIR lookups
    pub fn inc_nir(mut self, enable: bool) -> Self {
        self.options.inc_nir = enable;
        self
    }

    /// Restrict NIR fields
    pub fn nir_field_list(mut self, fields: Vec<NirField>) -> Self {
        self.options.nir_field_list = Some(fields);
        self
    }

    /// Enable or disable referral following
    pub fn get_referral(mut self, enable: bool) -> Self {
        self.options.get_referral = enable;
        self
    }

    /// Add blacklisted servers
    pub fn extra_blacklist(mut self, servers: Vec<String>) -> Self {
        self.options.extra_blacklist = servers;
        self
    }

    /// Swallow referral errors
    pub fn ignore_referral_errors(mut self, ignore: bool) -> Self {
        self.options.ignore_referral_errors = ignore;
        self
    }

    /// Restrict WHOIS fields
    pub fn field_list(mut self, fields: Vec<WhoisField>) -> Self {
        self.options.field_list = Some(fields);
        self
    }

    /// Set the RDAP entity depth
    pub fn depth(mut self, depth: u32) -> Self {
        self.options.depth = depth;
        self
    }

    /// Exclude RDAP entity handles
    pub fn excluded_entities(mut self, handles: Vec<String>) -> Self {
        self.options.excluded_entities = handles;
        self
    }

    /// Use the ARIN RDAP bootstrap
    pub fn bootstrap(mut self, enable: bool) -> Self {
        self.options.bootstrap = enable;
        self
    }

    /// Set the pause after an HTTP 429
    pub fn rate_limit_timeout(mut self, timeout: Duration) -> Self {
        self.options.rate_limit_timeout = timeout;
        self
    }

    /// Build the options
    pub fn build(self) -> Result<LookupOptions, String> {
        self.options.validate()?;
        Ok(self.options)
    }
}

impl Default for LookupOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_net_config() {
        let config = NetConfig::default();
        assert!(config.allow_permutations);
        assert!(config.proxy_http.is_none());
        assert!(config.timeout > Duration::ZERO);
    }

    #[test]
    fn test_net_config_validation() {
        assert!(NetConfig::builder().timeout(Duration::ZERO).build().is_err());
        assert!(NetConfig::builder().proxy_http("  ").build().is_err());
        let config = NetConfig::builder()
            .timeout(Duration::from_secs(2))
            .proxy_https("http://proxy.local:3128")
            .allow_permutations(false)
            .build()
            .unwrap();
        assert!(!config.allow_permutations);
        assert_eq!(config.proxy_https.as_deref(), Some("http://proxy.local:3128"));
    }

    #[test]
    fn test_lookup_options_defaults() {
        let options = LookupOptions::default();
        assert_eq!(options.retry_count, 3);
        assert!(options.get_asn_description);
        assert!(options.inc_nir);
        assert_eq!(options.depth, 0);
        assert_eq!(options.asn_method_order(), AsnMethod::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn test_empty_asn_methods_rejected() {
        let result = LookupOptions::builder().asn_methods(vec![]).build();
        assert!(result.unwrap_err().contains("at least one of dns, whois, http"));
    }

    #[test]
    fn test_asn_method_parse() {
        assert_eq!("DNS".parse::<AsnMethod>().unwrap(), AsnMethod::Dns);
        assert_eq!(" http ".parse::<AsnMethod>().unwrap(), AsnMethod::Http);
        assert!("ftp".parse::<AsnMethod>().is_err());
        assert_eq!(AsnMethod::Whois.to_string(), "whois");
    }
}
