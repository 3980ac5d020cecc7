//! Legacy WHOIS lookups and parsing
//!
//! A response is split into network blocks (see [`nets`]), then each block's
//! text window is run through the registry's field table (see [`fields`]).

pub mod fields;
pub(crate) mod nets;

use crate::asn::{AsnRecord, Rir};
use crate::config::LookupOptions;
use crate::error::{IpWhoisError, Result};
use crate::net::Net;
use crate::utils::unique_everseen;
use fields::{join_unique, parse_timestamp, registry_fields, rwhois_fields, FieldTable};
pub use fields::WhoisField;
use nets::{get_nets_arin, get_nets_lacnic, get_nets_other, NetBlock};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static REFERRAL_SERVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^ReferralServer:[^\S\n]+(.+:[0-9]+)$").expect("static regex")
});

/// Descriptive fields shared by registry networks and referral records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisFields {
    /// Network name
    pub name: Option<String>,
    /// Network handle
    pub handle: Option<String>,
    /// Owner description
    pub description: Option<String>,
    /// Country code, upper-cased
    pub country: Option<String>,
    /// State or province
    pub state: Option<String>,
    /// City
    pub city: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Unique contact e-mail addresses
    pub emails: Option<Vec<String>>,
    /// Registration timestamp
    pub created: Option<String>,
    /// Last-modified timestamp
    pub updated: Option<String>,
}

impl WhoisFields {
    fn set(&mut self, field: WhoisField, value: Option<String>) {
        let slot = match field {
            WhoisField::Name => &mut self.name,
            WhoisField::Handle => &mut self.handle,
            WhoisField::Description => &mut self.description,
            WhoisField::Country => &mut self.country,
            WhoisField::State => &mut self.state,
            WhoisField::City => &mut self.city,
            WhoisField::Address => &mut self.address,
            WhoisField::PostalCode => &mut self.postal_code,
            WhoisField::Created => &mut self.created,
            WhoisField::Updated => &mut self.updated,
            WhoisField::Cidr | WhoisField::Emails => return,
        };
        *slot = value;
    }
}

/// One network block from a registry response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisNet {
    /// One or more CIDRs joined by `", "`; never empty
    pub cidr: String,
    /// Range text as the registry printed it
    pub range: Option<String>,
    /// Parsed fields
    #[serde(flatten)]
    pub fields: WhoisFields,
}

/// Data from an RWhois referral server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisReferral {
    /// Referral host
    pub server: String,
    /// Referral port
    pub port: u16,
    /// `network:IP-Network` value
    pub cidr: Option<String>,
    /// Parsed fields
    #[serde(flatten)]
    pub fields: WhoisFields,
}

/// Parsed legacy WHOIS data for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisResults {
    /// The queried address
    pub query: String,
    /// Network blocks in response order
    pub nets: Vec<WhoisNet>,
    /// Raw registry response, when requested
    pub raw: Option<String>,
    /// Referral server data, when requested and available
    pub referral: Option<WhoisReferral>,
    /// Raw referral response, when requested
    pub raw_referral: Option<String>,
}

fn parse_fields(
    text: &str,
    table: &FieldTable,
    field_list: Option<&[WhoisField]>,
    date_format: Option<&str>,
) -> (WhoisFields, Option<String>) {
    let mut fields = WhoisFields::default();
    let mut cidr = None;

    for (field, pattern) in table {
        if let Some(list) = field_list {
            if *field != WhoisField::Cidr && !list.contains(field) {
                continue;
            }
        }

        let values = pattern.extract(text);
        let Some(first) = values.first() else {
            continue;
        };

        match field {
            WhoisField::Cidr => cidr = Some(first.clone()),
            WhoisField::Country => fields.country = Some(first.to_uppercase()),
            WhoisField::Emails => fields.emails = Some(unique_everseen(values)),
            WhoisField::Created | WhoisField::Updated => {
                let value = match date_format {
                    Some(format) => {
                        let parsed = parse_timestamp(first, format, 0);
                        if parsed.is_none() {
                            debug!("Could not parse {field} date {first:?} with {format}");
                        }
                        parsed
                    }
                    None => Some(first.clone()),
                };
                fields.set(*field, value);
            }
            _ => fields.set(*field, Some(join_unique(values))),
        }
    }

    (fields, cidr)
}

fn detect_blocks(registry: Rir, response: &str) -> Vec<NetBlock> {
    match registry {
        Rir::Arin => get_nets_arin(response),
        Rir::Lacnic => get_nets_lacnic(response),
        _ => get_nets_other(response),
    }
}

/// Parses a registry WHOIS response without any network I/O.
///
/// # Examples
///
/// ```
/// use ipwhois::asn::Rir;
/// use ipwhois::whois::parse_whois;
///
/// let text = "inetnum:        193.0.0.0 - 193.0.7.255\nnetname:        RIPE-NCC\ncountry:        nl\n";
/// let nets = parse_whois(Rir::Ripencc, text, None);
/// assert_eq!(nets[0].cidr, "193.0.0.0/21");
/// assert_eq!(nets[0].fields.country.as_deref(), Some("NL"));
/// ```
pub fn parse_whois(
    registry: Rir,
    response: &str,
    field_list: Option<&[WhoisField]>,
) -> Vec<WhoisNet> {
    let blocks = detect_blocks(registry, response);
    let table = registry_fields(registry);
    let date_format = registry.whois_date_format();

    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            let section_end = blocks
                .get(index + 1)
                .map_or(response.len(), |next| next.start);
            let section = response.get(block.end..section_end).unwrap_or_default();
            let (fields, _) = parse_fields(section, table, field_list, date_format);
            WhoisNet {
                cidr: block.cidr.clone(),
                range: block.range.clone(),
                fields,
            }
        })
        .collect()
}

/// Parses RWhois referral output (`network:Key:value` lines).
pub fn parse_referral(
    server: &str,
    port: u16,
    response: &str,
    field_list: Option<&[WhoisField]>,
) -> WhoisReferral {
    let (fields, cidr) = parse_fields(response, rwhois_fields(), field_list, None);
    WhoisReferral {
        server: server.to_string(),
        port,
        cidr,
        fields,
    }
}

/// First usable `ReferralServer: rwhois://host:port` in a response
pub fn find_referral_server(response: &str) -> Option<(String, u16)> {
    REFERRAL_SERVER.captures_iter(response).find_map(|caps| {
        let value = caps.get(1)?.as_str().trim();
        let target = value.strip_prefix("rwhois://")?;
        let (host, port) = target.rsplit_once(':')?;
        let port = port.parse::<u16>().ok()?;
        (!host.is_empty()).then(|| (host.to_string(), port))
    })
}

/// Legacy WHOIS lookups for one address
#[derive(Debug, Clone, Copy)]
pub struct Whois<'a> {
    net: &'a Net,
}

impl<'a> Whois<'a> {
    /// Creates a WHOIS client over `net`
    pub fn new(net: &'a Net) -> Self {
        Self { net }
    }

    /// Queries the registry from `asn` (unless `response` is given) and
    /// parses the network blocks.
    ///
    /// Referral following only happens for freshly fetched responses.
    pub async fn lookup(
        &self,
        options: &LookupOptions,
        asn: &AsnRecord,
        response: Option<String>,
    ) -> Result<WhoisResults> {
        let registry = asn.asn_registry;
        let field_list = options.field_list.as_deref();
        let mut referral_target = None;

        let response = match response {
            Some(response) => {
                debug!("Response given, skipping WHOIS query for {}", self.net.address_str());
                response
            }
            None => {
                debug!("Response not given, perform WHOIS lookup for {}", self.net.address_str());
                let response = self
                    .net
                    .get_whois(
                        Some(registry),
                        None,
                        43,
                        options.retry_count,
                        &options.extra_blacklist,
                    )
                    .await?;
                if options.get_referral {
                    referral_target = find_referral_server(&response);
                }
                response
            }
        };

        let mut referral = None;
        let mut raw_referral = None;
        if let Some((server, port)) = referral_target {
            debug!("Perform referral WHOIS lookup at {server}:{port}");
            let fetched = self
                .net
                .get_whois(
                    None,
                    Some(&server),
                    port,
                    options.retry_count,
                    &options.extra_blacklist,
                )
                .await;
            let referral_response = match fetched {
                Ok(text) => Some(text),
                Err(e @ (IpWhoisError::Blacklist(_) | IpWhoisError::WhoisLookup(_)))
                    if options.ignore_referral_errors =>
                {
                    debug!("Ignoring referral error: {e}");
                    None
                }
                Err(e) => return Err(e),
            };
            if let Some(text) = referral_response {
                debug!("Parsing referral WHOIS data");
                referral = Some(parse_referral(&server, port, &text, field_list));
                if options.inc_raw {
                    raw_referral = Some(text);
                }
            }
        }

        debug!("Parsing WHOIS data");
        let nets = parse_whois(registry, &response, field_list);

        Ok(WhoisResults {
            query: self.net.address_str().to_string(),
            nets,
            raw: options.inc_raw.then_some(response),
            referral,
            raw_referral,
        })
    }
}
