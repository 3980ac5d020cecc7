//! JPNIC and KRNIC response tables and network block detection

use super::{Nir, NirContact, NirField};
use crate::utils::{parse_network, summarize_range, unique_everseen};
use crate::whois::fields::{join_unique, parse_timestamp, FieldPattern};
use ipnet::IpNet;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use tracing::debug;

/// A network block marker found in an NIR response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NirBlock {
    pub cidr: String,
    pub range: String,
    pub start: usize,
    pub end: usize,
}

/// Contact data referenced from a network block
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContactRef {
    /// JPNIC handle, resolved with a second query
    Handle(String),
    /// KRNIC inline contact text
    Inline(String),
}

static JPNIC_NET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^.*?\[Network Number\][^\S\n]+.*?>(?P<val>[^<]+?)</A>[^\S\n]*$")
        .expect("static regex")
});

static KRNIC_NET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^IPv4 Address[^\S\n]*:[^\S\n]+(?:(?P<first>\S+)[^\S\n]-[^\S\n](?P<last>\S+)[^\S\n]\(.+?\)|(?P<net>.+?))[^\S\n]*$",
    )
    .expect("static regex")
});

fn jpnic(label: &str) -> FieldPattern {
    FieldPattern::line(&format!(
        r"(?m)^[^\n\[]*\[{label}\][^\S\n]+(?P<val>.+?)[^\S\n]*$"
    ))
}

fn krnic(label: &str) -> FieldPattern {
    FieldPattern::line(&format!(
        r"(?m)^[^\S\n]*(?:{label})[^\S\n]*:[^\S\n]*(?P<val>.+?)[^\S\n]*$"
    ))
}

pub(crate) type NirTable = Vec<(NirField, FieldPattern)>;

static JPNIC_FIELDS: LazyLock<NirTable> = LazyLock::new(|| {
    vec![
        (NirField::Name, jpnic("Organization")),
        (NirField::Handle, jpnic("Network Name")),
        (NirField::Created, jpnic("Assigned Date")),
        (NirField::Updated, jpnic("Last Update")),
        (NirField::Nameservers, jpnic("Nameserver")),
    ]
});

static KRNIC_FIELDS: LazyLock<NirTable> = LazyLock::new(|| {
    vec![
        (NirField::Name, krnic("Organization Name")),
        (NirField::Handle, krnic("Service Name|Network Type")),
        (NirField::Address, krnic("Address")),
        (NirField::PostalCode, krnic("Zip Code")),
        (NirField::Created, krnic("Registration Date")),
    ]
});

/// Contact field key, value pattern
pub(crate) type ContactTable = Vec<(&'static str, FieldPattern)>;

static JPNIC_CONTACT_FIELDS: LazyLock<ContactTable> = LazyLock::new(|| {
    vec![
        ("name", jpnic("Last, First")),
        ("email", jpnic("E-Mail")),
        ("organization", jpnic("Organization")),
        ("division", jpnic("Division")),
        ("title", jpnic("Title")),
        ("phone", jpnic("TEL")),
        ("fax", jpnic("FAX")),
        ("updated", jpnic("Last Update")),
    ]
});

static KRNIC_CONTACT_FIELDS: LazyLock<ContactTable> = LazyLock::new(|| {
    vec![
        ("name", krnic("Name")),
        ("email", krnic("E-Mail")),
        ("phone", krnic("Phone")),
    ]
});

static JPNIC_ADMIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^\n\[]*\[Administrative Contact\][^\S\n]+.*?>(?P<val>[^<]+?)</A>")
        .expect("static regex")
});

static JPNIC_TECH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^\n\[]*\[Technical Contact\][^\S\n]+.*?>(?P<val>[^<]+?)</A>")
        .expect("static regex")
});

static KRNIC_ADMIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)id="eng_isp_contact"[^>]*>(?P<val>.*?)</div>"#).expect("static regex")
});

static KRNIC_TECH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)id="eng_user_contact"[^>]*>(?P<val>.*?)</div>"#).expect("static regex")
});

impl Nir {
    pub(crate) fn fields(self) -> &'static NirTable {
        match self {
            Nir::Jpnic => &JPNIC_FIELDS,
            Nir::Krnic => &KRNIC_FIELDS,
        }
    }

    pub(crate) fn contact_fields(self) -> &'static ContactTable {
        match self {
            Nir::Jpnic => &JPNIC_CONTACT_FIELDS,
            Nir::Krnic => &KRNIC_CONTACT_FIELDS,
        }
    }

    /// Admin and tech contact references found in `section`
    pub(crate) fn contact_refs(self, section: &str) -> (Option<ContactRef>, Option<ContactRef>) {
        let find = |regex: &Regex| {
            regex
                .captures(section)
                .and_then(|c| c.name("val"))
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match self {
            Nir::Jpnic => (
                find(&JPNIC_ADMIN).map(ContactRef::Handle),
                find(&JPNIC_TECH).map(ContactRef::Handle),
            ),
            Nir::Krnic => (
                find(&KRNIC_ADMIN).map(ContactRef::Inline),
                find(&KRNIC_TECH).map(ContactRef::Inline),
            ),
        }
    }
}

fn first_host(net: &IpNet) -> IpAddr {
    match net {
        IpNet::V4(v4) => {
            let base = u32::from(v4.network());
            IpAddr::V4(Ipv4Addr::from(base.saturating_add(1).min(u32::from(v4.broadcast()))))
        }
        IpNet::V6(v6) => {
            let base = u128::from(v6.network());
            IpAddr::V6(Ipv6Addr::from(base.saturating_add(1).min(u128::from(v6.broadcast()))))
        }
    }
}

/// `[Network Number]` anchors in JPNIC HTML output
pub(crate) fn get_nets_jpnic(response: &str) -> Vec<NirBlock> {
    JPNIC_NET
        .captures_iter(response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.name("val")?.as_str().trim();
            let Some(net) = parse_network(value) else {
                debug!("Skipping invalid JPNIC network: {value}");
                return None;
            };
            Some(NirBlock {
                cidr: net.to_string(),
                range: format!("{} - {}", first_host(&net), net.broadcast()),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// `IPv4 Address : start - end (/len)` lines in KRNIC output
pub(crate) fn get_nets_krnic(response: &str) -> Vec<NirBlock> {
    KRNIC_NET
        .captures_iter(response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (cidr, range) = match (caps.name("first"), caps.name("last")) {
                (Some(first), Some(last)) => {
                    let first_addr: IpAddr = first.as_str().parse().ok()?;
                    let last_addr: IpAddr = last.as_str().parse().ok()?;
                    let nets = IpNet::aggregate(&summarize_range(first_addr, last_addr));
                    if nets.is_empty() {
                        return None;
                    }
                    let cidr = nets
                        .iter()
                        .map(IpNet::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    (cidr, format!("{} - {}", first.as_str(), last.as_str()))
                }
                _ => {
                    let value = caps.name("net")?.as_str().trim();
                    let net = parse_network(value)?;
                    (net.to_string(), value.to_string())
                }
            };
            Some(NirBlock {
                cidr,
                range,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Parses a date value with the NIR's formats, shifted to UTC
pub(crate) fn parse_nir_date(nir: Nir, value: &str) -> Option<String> {
    let parsed = nir
        .date_formats()
        .iter()
        .find_map(|format| parse_timestamp(value, format, nir.hour_offset()));
    if parsed.is_none() {
        debug!("NIR date parsing failed for {value:?}");
    }
    parsed
}

/// Values of one NIR network field within a section
pub(crate) fn extract_values(pattern: &FieldPattern, section: &str) -> Vec<String> {
    unique_everseen(pattern.extract(section))
}

/// Parses contact text with the NIR's contact table
pub(crate) fn parse_contact(nir: Nir, text: &str) -> NirContact {
    let mut contact = NirContact::default();
    for (key, pattern) in nir.contact_fields() {
        let values = pattern.extract(text);
        let Some(first) = values.first() else {
            continue;
        };
        let value = if *key == "updated" {
            parse_nir_date(nir, first)
        } else {
            Some(join_unique(values))
        };
        match *key {
            "name" => contact.name = value,
            "email" => contact.email = value,
            "organization" => contact.organization = value,
            "division" => contact.division = value,
            "title" => contact.title = value,
            "phone" => contact.phone = value,
            "fax" => contact.fax = value,
            "updated" => contact.updated = value,
            _ => {}
        }
    }
    contact
}
