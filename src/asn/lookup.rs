//! ASN resolution via Team Cymru DNS/WHOIS with an ARIN HTTP fallback

use super::registry::{registry_for_org_handle, Rir};
use crate::config::{AsnMethod, LookupOptions};
use crate::error::{IpWhoisError, Result};
use crate::net::Net;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// ASN and registry data for an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnRecord {
    /// Autonomous system number
    pub asn: Option<String>,
    /// Announced prefix containing the address
    pub asn_cidr: Option<String>,
    /// Two-letter country code, upper-cased
    pub asn_country_code: Option<String>,
    /// Allocation date
    pub asn_date: Option<String>,
    /// Registry that allocated the prefix
    pub asn_registry: Rir,
    /// AS name
    pub asn_description: Option<String>,
    /// Raw response the record was parsed from
    #[serde(skip)]
    pub raw: Option<String>,
}

impl AsnRecord {
    fn registry_only(registry: Rir) -> Self {
        Self {
            asn: None,
            asn_cidr: None,
            asn_country_code: None,
            asn_date: None,
            asn_registry: registry,
            asn_description: None,
            raw: None,
        }
    }

    fn prefix_len(&self) -> u8 {
        self.asn_cidr
            .as_deref()
            .and_then(|c| c.parse::<IpNet>().ok())
            .map_or(0, |n| n.prefix_len())
    }
}

fn clean(value: &str) -> Option<String> {
    let value = value.trim_matches(|c: char| c == ' ' || c == '"' || c == '\n' || c == '\r');
    (!value.is_empty()).then(|| value.to_string())
}

fn split_fields<'a>(response: &'a str, min: usize, kind: &str) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = response.split('|').collect();
    if fields.len() < min {
        return Err(IpWhoisError::AsnParse(format!("{kind}: {}", response.trim())));
    }
    Ok(fields)
}

fn parse_registry(value: &str) -> Result<Rir> {
    value.trim_matches(|c: char| c == ' ' || c == '\n').parse()
}

/// Parses one Cymru origin TXT record: `asn | cidr | cc | registry | date`.
///
/// # Examples
///
/// ```
/// use ipwhois::asn::{parse_fields_dns, Rir};
///
/// let record = parse_fields_dns("15169 | 74.125.225.0/24 | us | arin | 2007-03-13").unwrap();
/// assert_eq!(record.asn.as_deref(), Some("15169"));
/// assert_eq!(record.asn_country_code.as_deref(), Some("US"));
/// assert_eq!(record.asn_registry, Rir::Arin);
/// ```
pub fn parse_fields_dns(response: &str) -> Result<AsnRecord> {
    let fields = split_fields(response, 5, "DNS ASN response")?;
    let registry = parse_registry(fields[3])?;
    Ok(AsnRecord {
        asn: clean(fields[0]),
        asn_cidr: clean(fields[1]),
        asn_country_code: clean(fields[2]).map(|c| c.to_uppercase()),
        asn_date: clean(fields[4]),
        asn_registry: registry,
        asn_description: None,
        raw: Some(response.to_string()),
    })
}

/// Picks the most specific record when Cymru returns several prefixes.
pub fn parse_fields_dns_records(records: &[String]) -> Result<AsnRecord> {
    let mut first_err = None;
    let mut best: Option<AsnRecord> = None;
    for record in records {
        match parse_fields_dns(record) {
            Ok(parsed) => {
                if best
                    .as_ref()
                    .map_or(true, |b| parsed.prefix_len() > b.prefix_len())
                {
                    best = Some(parsed);
                }
            }
            Err(e) => {
                debug!("Skipping ASN TXT record {record:?}: {e}");
                first_err.get_or_insert(e);
            }
        }
    }
    best.ok_or_else(|| {
        first_err.unwrap_or_else(|| IpWhoisError::AsnParse("empty DNS ASN response".into()))
    })
}

/// Parses a verbose Cymru ASN record: `asn | cc | registry | date | description`.
pub fn parse_fields_verbose_dns(response: &str) -> Result<AsnRecord> {
    let fields = split_fields(response, 5, "verbose DNS ASN response")?;
    let registry = parse_registry(fields[2])?;
    Ok(AsnRecord {
        asn: clean(fields[0]),
        asn_cidr: None,
        asn_country_code: clean(fields[1]).map(|c| c.to_uppercase()),
        asn_date: clean(fields[3]),
        asn_registry: registry,
        asn_description: clean(fields[4]),
        raw: Some(response.to_string()),
    })
}

/// Parses a Cymru WHOIS line: `asn | ip | cidr | cc | registry | date | description`.
pub fn parse_fields_whois(response: &str) -> Result<AsnRecord> {
    let fields = split_fields(response, 7, "WHOIS ASN response")?;
    let registry = parse_registry(fields[4])?;
    Ok(AsnRecord {
        asn: clean(fields[0]),
        asn_cidr: clean(fields[2]),
        asn_country_code: clean(fields[3]).map(|c| c.to_uppercase()),
        asn_date: clean(fields[5]),
        asn_registry: registry,
        asn_description: clean(fields[6]),
        raw: Some(response.to_string()),
    })
}

/// Derives the registry from ARIN REST `nets` JSON.
///
/// Only the registry can be determined this way. The most specific
/// network (last in the list) with a mappable `orgRef` handle wins.
pub fn parse_fields_http(
    response: &serde_json::Value,
    extra_org_map: &HashMap<String, String>,
) -> Result<AsnRecord> {
    let nets = match response.pointer("/nets/net") {
        Some(serde_json::Value::Array(list)) => list.iter().collect::<Vec<_>>(),
        Some(single) if single.is_object() => vec![single],
        _ => {
            debug!("No networks found");
            Vec::new()
        }
    };

    let registry = nets.iter().rev().find_map(|net| {
        let handle = net.pointer("/orgRef/@handle")?.as_str()?;
        let found = registry_for_org_handle(handle, extra_org_map);
        if found.is_none() {
            debug!("Could not parse ASN registry via HTTP: {handle}");
        }
        found
    });

    registry
        .map(|rir| {
            let mut record = AsnRecord::registry_only(rir);
            record.raw = Some(response.to_string());
            record
        })
        .ok_or_else(|| IpWhoisError::AsnRegistry("ASN registry lookup failed.".to_string()))
}

/// Resolves the ASN record of an address, trying methods in order
#[derive(Debug, Clone, Copy)]
pub struct IpAsn<'a> {
    net: &'a Net,
}

impl<'a> IpAsn<'a> {
    /// Creates a resolver over `net`
    pub fn new(net: &'a Net) -> Self {
        Self { net }
    }

    /// Runs the DNS → WHOIS → HTTP chain.
    ///
    /// The first method that succeeds ends the chain. Without an explicit
    /// method list and with permutations disallowed, the first failure is
    /// final.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ipwhois::asn::IpAsn;
    /// use ipwhois::{LookupOptions, Net, NetConfig};
    ///
    /// # async fn example() -> ipwhois::Result<()> {
    /// let net = Net::new("74.125.225.229", NetConfig::default())?;
    /// let record = IpAsn::new(&net).lookup(&LookupOptions::default()).await?;
    /// println!("AS{}", record.asn.unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn lookup(&self, options: &LookupOptions) -> Result<AsnRecord> {
        options.validate().map_err(IpWhoisError::Config)?;
        let explicit = options.asn_methods.is_some();
        let methods = options.asn_method_order();

        let mut found = None;
        let mut dns_success = false;
        for (index, method) in methods.iter().enumerate() {
            if index > 0 && !explicit && !self.net.config().allow_permutations {
                return Err(IpWhoisError::AsnRegistry(
                    "ASN registry lookup failed. Permutations not allowed.".to_string(),
                ));
            }

            let attempt = match method {
                AsnMethod::Dns => self.lookup_dns().await,
                AsnMethod::Whois => self.lookup_whois(options.retry_count).await,
                AsnMethod::Http => {
                    self.lookup_http(options.retry_count, &options.extra_org_map)
                        .await
                }
            };

            match attempt {
                Ok(record) => {
                    dns_success = *method == AsnMethod::Dns;
                    found = Some(record);
                    break;
                }
                Err(e) if e.is_asn_fallthrough() => {
                    debug!("ASN {method} lookup failed for {}: {e}", self.net.address_str());
                }
                Err(e) => return Err(e),
            }
        }

        let mut record = found.ok_or_else(|| {
            IpWhoisError::AsnRegistry("ASN lookup failed with no more methods to try.".to_string())
        })?;

        if options.get_asn_description && dns_success {
            if let Some(asn) = record.asn.clone() {
                match self.describe(&asn).await {
                    Ok(description) => record.asn_description = description,
                    Err(e) => debug!("ASN description lookup failed for AS{asn}: {e}"),
                }
            }
        }

        if !options.inc_raw {
            record.raw = None;
        }
        Ok(record)
    }

    async fn lookup_dns(&self) -> Result<AsnRecord> {
        let records = self.net.get_asn_dns().await?;
        parse_fields_dns_records(&records)
    }

    async fn lookup_whois(&self, retry_count: u32) -> Result<AsnRecord> {
        let response = self.net.get_asn_whois(retry_count).await?;
        parse_fields_whois(&response)
    }

    async fn lookup_http(
        &self,
        retry_count: u32,
        extra_org_map: &HashMap<String, String>,
    ) -> Result<AsnRecord> {
        let response = self.net.get_asn_http(retry_count).await?;
        parse_fields_http(&response, extra_org_map)
    }

    async fn describe(&self, asn: &str) -> Result<Option<String>> {
        let response = self.net.get_asn_verbose_dns(asn).await?;
        Ok(parse_fields_verbose_dns(&response)?.asn_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetConfig;
    use crate::net::test_support::*;
    use crate::net::{TransportError, Transports};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const ZONE: &str = "229.225.125.74.origin.asn.cymru.com";
    const WHOIS_LINE: &str =
        "15169   | 74.125.225.229   | 74.125.225.0/24     | US | arin     | 2007-03-13 | GOOGLE - Google LLC, US\n";
    const ARIN_JSON: &str = r#"{"nets": {"net": {"orgRef": {"@handle": "GOGL"}}}}"#;

    fn dns_table() -> TableDns {
        TableDns {
            txt: vec![
                (
                    ZONE.to_string(),
                    vec!["15169 | 74.125.225.0/24 | US | arin | 2007-03-13".to_string()],
                ),
                (
                    "AS15169.asn.cymru.com".to_string(),
                    vec!["15169 | US | arin | 2000-03-30 | GOOGLE - Google LLC, US".to_string()],
                ),
            ],
            ptr: vec![],
        }
    }

    #[test]
    fn test_parse_dns_fields() {
        let record = parse_fields_dns("\"15169 | 74.125.225.0/24 | us | arin | 2007-03-13\"").unwrap();
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.asn_cidr.as_deref(), Some("74.125.225.0/24"));
        assert_eq!(record.asn_country_code.as_deref(), Some("US"));
        assert_eq!(record.asn_date.as_deref(), Some("2007-03-13"));
    }

    #[test]
    fn test_parse_dns_unknown_registry() {
        let err = parse_fields_dns("15169 | 74.125.225.0/24 | US | nic | 2007-03-13").unwrap_err();
        assert!(matches!(err, IpWhoisError::AsnRegistry(_)));
    }

    #[test]
    fn test_parse_dns_malformed() {
        assert!(matches!(
            parse_fields_dns("15169 | 74.125.225.0/24"),
            Err(IpWhoisError::AsnParse(_))
        ));
    }

    #[test]
    fn test_dns_prefers_most_specific_prefix() {
        let records = vec![
            "15169 | 74.125.0.0/16 | US | arin | 2007-03-13".to_string(),
            "15169 | 74.125.225.0/24 | US | arin | 2007-03-13".to_string(),
            "15169 | 74.125.224.0/19 | US | arin | 2007-03-13".to_string(),
        ];
        let record = parse_fields_dns_records(&records).unwrap();
        assert_eq!(record.asn_cidr.as_deref(), Some("74.125.225.0/24"));
    }

    #[test]
    fn test_parse_whois_fields() {
        let record = parse_fields_whois(WHOIS_LINE).unwrap();
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.asn_cidr.as_deref(), Some("74.125.225.0/24"));
        assert_eq!(record.asn_registry, Rir::Arin);
        assert_eq!(record.asn_description.as_deref(), Some("GOOGLE - Google LLC, US"));
    }

    #[test]
    fn test_parse_verbose_dns() {
        let record =
            parse_fields_verbose_dns("15169 | US | arin | 2000-03-30 | GOOGLE - Google LLC, US")
                .unwrap();
        assert_eq!(record.asn_description.as_deref(), Some("GOOGLE - Google LLC, US"));
        assert_eq!(record.asn_date.as_deref(), Some("2000-03-30"));
    }

    #[test]
    fn test_parse_http_list_uses_last_mappable() {
        let response = json!({"nets": {"net": [
            {"orgRef": {"@handle": "ARIN"}},
            {"orgRef": {"@handle": "RIPE"}},
            {"orgRef": {"@handle": "SOMEORG"}}
        ]}});
        let record = parse_fields_http(&response, &HashMap::new()).unwrap();
        assert_eq!(record.asn_registry, Rir::Ripencc);
        assert!(record.asn.is_none());
    }

    #[test]
    fn test_parse_http_extra_org_map() {
        let response: serde_json::Value = serde_json::from_str(ARIN_JSON).unwrap();
        assert!(matches!(
            parse_fields_http(&response, &HashMap::new()),
            Err(IpWhoisError::AsnRegistry(_))
        ));
        let extra = HashMap::from([("GOGL".to_string(), "arin".to_string())]);
        assert_eq!(
            parse_fields_http(&response, &extra).unwrap().asn_registry,
            Rir::Arin
        );
    }

    #[tokio::test]
    async fn test_dns_success_stops_chain_and_fetches_description() {
        let whois = ScriptedWhois::new(vec![]);
        let http = ScriptedHttp::new(vec![]);
        let net = net_with("74.125.225.229", whois.clone(), http, Arc::new(dns_table()));

        let record = IpAsn::new(&net).lookup(&LookupOptions::default()).await.unwrap();
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.asn_description.as_deref(), Some("GOOGLE - Google LLC, US"));
        assert!(record.raw.is_none());
        assert_eq!(whois.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_config_falls_through_to_whois() {
        let whois = ScriptedWhois::new(vec![Ok(WHOIS_LINE.to_string())]);
        let http = ScriptedHttp::new(vec![]);
        let net = Net::with_transports(
            "74.125.225.229",
            NetConfig::default(),
            Transports {
                whois: whois.clone(),
                http: http.clone(),
                dns: Arc::new(TableDns::default()),
            },
        )
        .unwrap();

        let record = IpAsn::new(&net).lookup(&LookupOptions::default()).await.unwrap();
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.asn_cidr.as_deref(), Some("74.125.225.0/24"));
        assert_eq!(whois.calls(), 1);
        assert!(http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_permutations_stops_after_first_failure() {
        let whois = ScriptedWhois::new(vec![Ok(WHOIS_LINE.to_string())]);
        let config = NetConfig::builder()
            .timeout(Duration::from_millis(200))
            .allow_permutations(false)
            .build()
            .unwrap();
        let net = Net::with_transports(
            "74.125.225.229",
            config,
            Transports {
                whois: whois.clone(),
                http: ScriptedHttp::new(vec![]),
                dns: Arc::new(TableDns::default()),
            },
        )
        .unwrap();
        let err = IpAsn::new(&net)
            .lookup(&LookupOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Permutations not allowed"));
        assert_eq!(whois.calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_methods_fall_through_to_whois() {
        let whois = ScriptedWhois::new(vec![Ok(WHOIS_LINE.to_string())]);
        let net = net_with(
            "74.125.225.229",
            whois.clone(),
            ScriptedHttp::new(vec![]),
            Arc::new(TableDns::default()),
        );
        let options = LookupOptions::builder()
            .asn_methods(vec![AsnMethod::Dns, AsnMethod::Whois, AsnMethod::Http])
            .build()
            .unwrap();
        let record = IpAsn::new(&net).lookup(&options).await.unwrap();
        assert_eq!(record.asn_cidr.as_deref(), Some("74.125.225.0/24"));
        // WHOIS success never triggers the description query
        assert_eq!(record.asn_description.as_deref(), Some("GOOGLE - Google LLC, US"));
        assert_eq!(whois.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_methods_fail() {
        let whois = ScriptedWhois::new(vec![Err(TransportError::Timeout)]);
        let http = ScriptedHttp::new(vec![ScriptedHttp::ok(200, r#"{"nets": null}"#)]);
        let net = net_with(
            "74.125.225.229",
            whois,
            http.clone(),
            Arc::new(TableDns::default()),
        );
        let options = LookupOptions::builder()
            .retry_count(0)
            .asn_methods(vec![AsnMethod::Dns, AsnMethod::Whois, AsnMethod::Http])
            .build()
            .unwrap();
        let err = IpAsn::new(&net).lookup(&options).await.unwrap_err();
        assert_eq!(err.to_string(), "ASN lookup failed with no more methods to try.");
        assert_eq!(http.requests.lock().unwrap().len(), 1);
    }
}
