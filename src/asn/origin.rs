//! Routes originated by an ASN, from RADb WHOIS or its web query form

use crate::config::{AsnMethod, NetConfig};
use crate::error::{IpWhoisError, Result};
use crate::net::retry::{with_retries, Failure};
use crate::net::{HttpRequest, Transports};
use crate::whois::fields::{join_unique, FieldPattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// RADb WHOIS server
pub const RADB_WHOIS: &str = "whois.radb.net";

/// RADb web query form
pub const RADB_HTTP_URL: &str = "http://www.radb.net/query/";

static ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^route6?:[^\S\n]+(?P<val>.+?)[^\S\n]*$").expect("static regex")
});

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));

/// A field parsed from a route object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsnOriginField {
    /// `descr`
    Description,
    /// `mnt-by`
    Maintainer,
    /// `changed`
    Updated,
    /// `source`
    Source,
}

impl AsnOriginField {
    /// Every field
    pub const ALL: [AsnOriginField; 4] = [
        AsnOriginField::Description,
        AsnOriginField::Maintainer,
        AsnOriginField::Updated,
        AsnOriginField::Source,
    ];

    /// snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            AsnOriginField::Description => "description",
            AsnOriginField::Maintainer => "maintainer",
            AsnOriginField::Updated => "updated",
            AsnOriginField::Source => "source",
        }
    }

    fn key(self) -> &'static str {
        match self {
            AsnOriginField::Description => "descr",
            AsnOriginField::Maintainer => "mnt-by",
            AsnOriginField::Updated => "changed",
            AsnOriginField::Source => "source",
        }
    }
}

impl fmt::Display for AsnOriginField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsnOriginField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        AsnOriginField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown ASN origin field: {s}"))
    }
}

static ORIGIN_FIELDS: LazyLock<Vec<(AsnOriginField, FieldPattern)>> = LazyLock::new(|| {
    AsnOriginField::ALL
        .into_iter()
        .map(|field| {
            let pattern = format!(r"(?m)^{}:[^\S\n]+(?P<val>.+?)[^\S\n]*$", field.key());
            (field, FieldPattern::line(&pattern))
        })
        .collect()
});

/// A route originated by the ASN
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnOriginNet {
    /// Route prefix
    pub cidr: String,
    /// `descr` lines
    pub description: Option<String>,
    /// `mnt-by` lines
    pub maintainer: Option<String>,
    /// `changed` lines
    pub updated: Option<String>,
    /// Source database
    pub source: Option<String>,
}

/// ASN origin lookup output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnOriginResults {
    /// The queried ASN, `AS`-prefixed
    pub query: String,
    /// Routes in response order
    pub nets: Vec<AsnOriginNet>,
    /// Raw response, when requested
    pub raw: Option<String>,
}

/// Options for [`AsnOrigin::lookup`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnOriginOptions {
    /// Keep the raw response
    pub inc_raw: bool,
    /// Retries for each failed query
    pub retry_count: u32,
    /// Restrict parsing to these fields
    pub field_list: Option<Vec<AsnOriginField>>,
    /// Methods to try in order; only `whois` and `http` apply
    pub methods: Vec<AsnMethod>,
    /// Stop at the first method whose query succeeds, even when the
    /// response holds no routes
    pub stop_after_success: bool,
    /// Extra RIPE-style query flags such as `-T route`
    pub add_query_params: String,
    /// WHOIS server to query instead of RADb
    pub server: Option<String>,
}

impl Default for AsnOriginOptions {
    fn default() -> Self {
        Self {
            inc_raw: false,
            retry_count: crate::config::timing::DEFAULT_RETRY_COUNT,
            field_list: None,
            methods: vec![AsnMethod::Whois, AsnMethod::Http],
            stop_after_success: true,
            add_query_params: String::new(),
            server: None,
        }
    }
}

impl AsnOriginOptions {
    /// Validate the options
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self
            .methods
            .iter()
            .any(|m| matches!(m, AsnMethod::Whois | AsnMethod::Http))
        {
            return Err("methods argument requires at least one of whois, http.".to_string());
        }
        Ok(())
    }
}

/// Adds the `AS` prefix when missing
pub fn normalize_asn(asn: &str) -> String {
    let asn = asn.trim();
    match (asn.get(..2), asn.get(2..)) {
        (Some(prefix), Some(number)) if prefix.eq_ignore_ascii_case("AS") => format!("AS{number}"),
        _ => format!("AS{asn}"),
    }
}

/// Parses route objects from a RADb WHOIS response, or from the web form
/// output once `<br>` tags are turned into newlines.
///
/// # Examples
///
/// ```
/// use ipwhois::asn::parse_asn_origin;
///
/// let text = "route:      66.249.64.0/19\ndescr:      Google\norigin:     AS15169\nsource:     RADB\n";
/// let nets = parse_asn_origin(text, None);
/// assert_eq!(nets[0].cidr, "66.249.64.0/19");
/// assert_eq!(nets[0].source.as_deref(), Some("RADB"));
/// ```
pub fn parse_asn_origin(response: &str, field_list: Option<&[AsnOriginField]>) -> Vec<AsnOriginNet> {
    let blocks: Vec<(String, usize, usize)> = ROUTE
        .captures_iter(response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let cidr = caps.name("val")?.as_str().trim();
            (!cidr.is_empty()).then(|| (cidr.to_string(), whole.start(), whole.end()))
        })
        .collect();

    debug!("Parsing ASN origin data: {} nets", blocks.len());
    blocks
        .iter()
        .enumerate()
        .map(|(index, (cidr, _, end))| {
            let section_end = blocks
                .get(index + 1)
                .map_or(response.len(), |(_, start, _)| *start);
            let section = response.get(*end..section_end).unwrap_or_default();

            let mut net = AsnOriginNet {
                cidr: cidr.clone(),
                ..AsnOriginNet::default()
            };
            for (field, pattern) in ORIGIN_FIELDS.iter() {
                if field_list.is_some_and(|list| !list.contains(field)) {
                    continue;
                }
                let values = pattern.extract(section);
                if values.is_empty() {
                    continue;
                }
                let value = Some(join_unique(values));
                match field {
                    AsnOriginField::Description => net.description = value,
                    AsnOriginField::Maintainer => net.maintainer = value,
                    AsnOriginField::Updated => net.updated = value,
                    AsnOriginField::Source => net.source = value,
                }
            }
            net
        })
        .collect()
}

fn html_to_text(body: &str) -> String {
    BREAK_TAG.replace_all(body, "\n").into_owned()
}

/// Looks up the routes an ASN originates
#[derive(Debug, Clone)]
pub struct AsnOrigin {
    config: NetConfig,
    transports: Transports,
}

impl AsnOrigin {
    /// Uses the real transports
    pub fn new(config: NetConfig) -> Result<Self> {
        config.validate().map_err(IpWhoisError::Config)?;
        let transports = Transports::from_config(&config)?;
        Ok(Self { config, transports })
    }

    /// Uses the given transports
    pub fn with_transports(config: NetConfig, transports: Transports) -> Self {
        Self { config, transports }
    }

    /// Queries each method in turn (unless `response` is given) and parses
    /// the route objects.
    pub async fn lookup(
        &self,
        asn: &str,
        options: &AsnOriginOptions,
        response: Option<String>,
    ) -> Result<AsnOriginResults> {
        options.validate().map_err(IpWhoisError::Config)?;
        let asn = normalize_asn(asn);

        let response = match response {
            Some(response) => response,
            None => self.fetch(&asn, options).await?,
        };

        let nets = parse_asn_origin(&response, options.field_list.as_deref());
        Ok(AsnOriginResults {
            query: asn,
            nets,
            raw: options.inc_raw.then_some(response),
        })
    }

    async fn fetch(&self, asn: &str, options: &AsnOriginOptions) -> Result<String> {
        let mut found: Option<String> = None;
        for method in &options.methods {
            let attempt = match method {
                AsnMethod::Whois => {
                    debug!("Response not given, perform ASN origin WHOIS lookup for {asn}");
                    self.get_asn_origin_whois(asn, options).await
                }
                AsnMethod::Http => {
                    debug!("Response not given, perform ASN origin HTTP lookup for {asn}");
                    self.get_asn_origin_http(asn, options.retry_count).await
                }
                AsnMethod::Dns => {
                    debug!("Skipping DNS for ASN origin lookup");
                    continue;
                }
            };

            match attempt {
                Ok(text) => {
                    found = Some(text);
                    if options.stop_after_success {
                        break;
                    }
                }
                Err(e) => debug!("ASN origin {method} lookup failed: {e}"),
            }
        }

        found.ok_or_else(|| {
            IpWhoisError::AsnOriginLookup(
                "ASN origin lookup failed with no more methods to try.".to_string(),
            )
        })
    }

    /// Raw RADb WHOIS (` <flags> -i origin AS<n> \r\n`) response.
    pub async fn get_asn_origin_whois(&self, asn: &str, options: &AsnOriginOptions) -> Result<String> {
        let server = options.server.as_deref().unwrap_or(RADB_WHOIS);
        let query = format!(" {} -i origin {asn} \r\n", options.add_query_params);
        debug!("ASN origin WHOIS query for {asn} at {server}:43");

        with_retries(
            "ASN origin WHOIS",
            options.retry_count,
            self.config.rate_limit_wait,
            || async {
                let response = self
                    .transports
                    .whois
                    .query(server, 43, &query, self.config.timeout)
                    .await
                    .map_err(|e| Failure::Transient(e.to_string()))?;
                if response.contains("Query rate limit exceeded") {
                    return Err(Failure::RateLimited);
                }
                if response.contains("error 501") || response.contains("error 230") {
                    return Err(Failure::Fatal(IpWhoisError::WhoisLookup(format!(
                        "{asn} (query error)"
                    ))));
                }
                Ok(response)
            },
        )
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::WhoisLookup(format!("{asn} ({msg})")),
                || IpWhoisError::WhoisRateLimit(asn.to_string()),
            )
        })
    }

    /// RADb web form response with `<br>` turned into newlines.
    pub async fn get_asn_origin_http(&self, asn: &str, retry_count: u32) -> Result<String> {
        let form = [
            ("advanced_query", "1"),
            ("keywords", asn),
            ("query", "Query"),
            ("-T option", "inet-rtr"),
            ("ip_option", ""),
            ("-i", "1"),
            ("-i option", "origin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let request = HttpRequest::post_form(RADB_HTTP_URL, form);

        with_retries("ASN origin HTTP", retry_count, self.config.rate_limit_wait, || async {
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
                    "{RADB_HTTP_URL} (HTTP {})",
                    response.status
                ))));
            }
            Ok(html_to_text(&response.body))
        })
        .await
        .map_err(|e| {
            e.into_error(
                |msg| IpWhoisError::HttpLookup(format!("{RADB_HTTP_URL} ({msg})")),
                || IpWhoisError::HttpRateLimit(RADB_HTTP_URL.to_string()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::test_support::*;
    use crate::net::TransportError;
    use std::sync::Arc;

    const RADB_RESPONSE: &str = "\
route:      66.249.64.0/19
descr:      Google
descr:      Mountain View
origin:     AS15169
mnt-by:     MAINT-AS15169
changed:    noc@google.com 20120301
source:     RADB

route6:     2001:4860::/32
descr:      Google IPv6
origin:     AS15169
source:     RADB
";

    fn origin(whois: Arc<ScriptedWhois>, http: Arc<ScriptedHttp>) -> AsnOrigin {
        AsnOrigin::with_transports(
            fast_config(),
            Transports {
                whois,
                http,
                dns: Arc::new(TableDns::default()),
            },
        )
    }

    #[test]
    fn test_normalize_asn() {
        assert_eq!(normalize_asn("15169"), "AS15169");
        assert_eq!(normalize_asn("AS15169"), "AS15169");
        assert_eq!(normalize_asn("as15169"), "AS15169");
    }

    #[test]
    fn test_parse_routes() {
        let nets = parse_asn_origin(RADB_RESPONSE, None);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].description.as_deref(), Some("Google\nMountain View"));
        assert_eq!(nets[0].maintainer.as_deref(), Some("MAINT-AS15169"));
        assert_eq!(nets[0].updated.as_deref(), Some("noc@google.com 20120301"));
        assert_eq!(nets[1].cidr, "2001:4860::/32");
        assert!(nets[1].maintainer.is_none());
    }

    #[test]
    fn test_parse_routes_field_list() {
        let nets = parse_asn_origin(RADB_RESPONSE, Some(&[AsnOriginField::Source]));
        assert!(nets[0].description.is_none());
        assert_eq!(nets[0].source.as_deref(), Some("RADB"));
    }

    #[test]
    fn test_html_breaks() {
        let text = html_to_text("route:      66.249.64.0/19<br>descr:      Google<BR/>");
        let nets = parse_asn_origin(&text, None);
        assert_eq!(nets[0].cidr, "66.249.64.0/19");
        assert_eq!(nets[0].description.as_deref(), Some("Google"));
    }

    #[test]
    fn test_options_require_whois_or_http() {
        let options = AsnOriginOptions {
            methods: vec![AsnMethod::Dns],
            ..AsnOriginOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[tokio::test]
    async fn test_whois_query_format() {
        let whois = ScriptedWhois::new(vec![Ok(RADB_RESPONSE.to_string())]);
        let lookup = origin(whois.clone(), ScriptedHttp::new(vec![]));
        let options = AsnOriginOptions {
            add_query_params: "-T route".to_string(),
            ..AsnOriginOptions::default()
        };
        let results = lookup.lookup("15169", &options, None).await.unwrap();
        assert_eq!(results.query, "AS15169");
        assert_eq!(results.nets.len(), 2);

        let queries = whois.queries.lock().unwrap();
        assert_eq!(queries[0].0, "whois.radb.net");
        assert_eq!(queries[0].2, " -T route -i origin AS15169 \r\n");
    }

    #[tokio::test]
    async fn test_stop_after_success_on_empty_response() {
        let whois = ScriptedWhois::new(vec![Ok("% No entries found\n".to_string())]);
        let http = ScriptedHttp::new(vec![ScriptedHttp::ok(200, RADB_RESPONSE)]);
        let lookup = origin(whois.clone(), http.clone());

        let results = lookup
            .lookup("AS15169", &AsnOriginOptions::default(), None)
            .await
            .unwrap();
        assert!(results.nets.is_empty());
        assert_eq!(whois.calls(), 1);
        assert!(http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_http() {
        let whois = ScriptedWhois::new(vec![Err(TransportError::Timeout)]);
        let http = ScriptedHttp::new(vec![ScriptedHttp::ok(
            200,
            "route:      66.249.64.0/19<br>source:     RADB<br>",
        )]);
        let lookup = origin(whois, http.clone());
        let options = AsnOriginOptions {
            retry_count: 0,
            inc_raw: true,
            ..AsnOriginOptions::default()
        };
        let results = lookup.lookup("AS15169", &options, None).await.unwrap();
        assert_eq!(results.nets.len(), 1);
        assert!(results.raw.unwrap().contains('\n'));

        let requests = http.requests.lock().unwrap();
        assert!(requests[0]
            .form
            .contains(&("keywords".to_string(), "AS15169".to_string())));
    }

    #[tokio::test]
    async fn test_all_methods_fail() {
        let whois = ScriptedWhois::new(vec![Err(TransportError::Timeout)]);
        let http = ScriptedHttp::new(vec![ScriptedHttp::ok(500, "")]);
        let lookup = origin(whois, http);
        let options = AsnOriginOptions {
            retry_count: 0,
            ..AsnOriginOptions::default()
        };
        let err = lookup.lookup("15169", &options, None).await.unwrap_err();
        assert!(matches!(err, IpWhoisError::AsnOriginLookup(_)));
    }
}
