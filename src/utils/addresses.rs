//! De-duplication and address extraction from free text

use ipnet::IpNet;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::LazyLock;

static IPV4_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?P<ip>(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}",
        r"(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9]))\b",
        r"(?:/(?P<len>3[0-2]|[12]?[0-9])\b)?",
        r"(?::(?P<port>[0-9]{1,5})\b)?",
    ))
    .expect("static IPv4 token regex")
});

static IPV6_BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<ip>[0-9A-Fa-f:.]+)\](?::(?P<port>[0-9]{1,5})\b)?")
        .expect("static bracketed IPv6 regex")
});

static IPV6_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<ip>[0-9A-Fa-f]*:[0-9A-Fa-f:.]*:[0-9A-Fa-f.]*)(?:/(?P<len>[0-9]{1,3})\b)?")
        .expect("static bare IPv6 regex")
});

/// Occurrence counts for one address or network found in text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressCount {
    /// Number of times the address appeared
    pub count: u64,
    /// Number of times each port was attached to it
    pub ports: BTreeMap<u16, u64>,
}

/// Returns unique elements, preserving the order of first appearance.
///
/// # Examples
///
/// ```
/// use ipwhois::utils::unique_everseen;
///
/// assert_eq!(unique_everseen("AAAABBBCCDAABBB".chars()), vec!['A', 'B', 'C', 'D']);
/// ```
pub fn unique_everseen<I, T>(items: I) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn network_key(addr: IpAddr, len: Option<&str>) -> Option<String> {
    match len {
        Some(len) => {
            let net = IpNet::new(addr, len.parse().ok()?).ok()?;
            Some(net.trunc().to_string())
        }
        None => Some(addr.to_string()),
    }
}

fn record(map: &mut BTreeMap<String, AddressCount>, key: String, port: Option<&str>) {
    let entry = map.entry(key).or_default();
    entry.count += 1;
    if let Some(port) = port.and_then(|p| p.parse::<u16>().ok()) {
        *entry.ports.entry(port).or_default() += 1;
    }
}

/// Finds every IPv4/IPv6 address and network in `data` and counts them.
///
/// IPv4 addresses may carry `/len` or `:port`; IPv6 ports are only
/// recognised in the bracketed `[addr]:port` form.
pub fn unique_addresses(data: &str) -> BTreeMap<String, AddressCount> {
    let mut found = BTreeMap::new();

    for caps in IPV4_TOKEN.captures_iter(data) {
        let Some(addr) = caps.name("ip").and_then(|m| m.as_str().parse::<IpAddr>().ok()) else {
            continue;
        };
        if let Some(key) = network_key(addr, caps.name("len").map(|m| m.as_str())) {
            record(&mut found, key, caps.name("port").map(|m| m.as_str()));
        }
    }

    let mut bracketed = Vec::new();
    for caps in IPV6_BRACKETED.captures_iter(data) {
        let (Some(whole), Some(ip)) = (caps.get(0), caps.name("ip")) else {
            continue;
        };
        if let Ok(addr) = ip.as_str().parse::<Ipv6Addr>() {
            bracketed.push(whole.range());
            record(
                &mut found,
                addr.to_string(),
                caps.name("port").map(|m| m.as_str()),
            );
        }
    }

    for caps in IPV6_BARE.captures_iter(data) {
        let (Some(whole), Some(ip)) = (caps.get(0), caps.name("ip")) else {
            continue;
        };
        if bracketed.iter().any(|r| r.contains(&whole.start())) {
            continue;
        }
        let Ok(addr) = ip.as_str().parse::<Ipv6Addr>() else {
            continue;
        };
        if let Some(key) = network_key(IpAddr::V6(addr), caps.name("len").map(|m| m.as_str())) {
            record(&mut found, key, None);
        }
    }

    found
}
