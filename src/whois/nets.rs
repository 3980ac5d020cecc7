//! Network block detection in legacy WHOIS text

use crate::utils::{parse_network, summarize_range};
use ipnet::IpNet;
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;
use tracing::debug;

/// Where one network block starts in a response and what it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetBlock {
    /// One or more CIDRs joined by `", "`
    pub cidr: String,
    /// The range text the CIDRs came from, when the registry shows one
    pub range: Option<String>,
    /// Byte offset where the marker line starts
    pub start: usize,
    /// Byte offset where the marker line ends
    pub end: usize,
}

static ARIN_NET_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^NetRange:[^\S\n]+(.+)$").expect("static regex"));

static ARIN_CIDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^CIDR:[^\S\n]+(.+?,[^\S\n].+|.+)$").expect("static regex")
});

static LACNIC_NET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:inetnum|inet6num|route):[^\S\n]+(.+?,[^\S\n].+|.+)$")
        .expect("static regex")
});

static OTHER_NET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:inetnum|inet6num|route6?):[^\S\n]+((.+?)[^\S\n]-[^\S\n](.+)|.+)$")
        .expect("static regex")
});

fn join_cidrs(nets: &[IpNet]) -> String {
    nets.iter()
        .map(IpNet::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CIDR:` lines start ARIN blocks; the nearest preceding `NetRange:`
/// supplies the range.
pub(crate) fn get_nets_arin(response: &str) -> Vec<NetBlock> {
    let ranges: Vec<(usize, String)> = ARIN_NET_RANGE
        .captures_iter(response)
        .filter_map(|c| Some((c.get(0)?.start(), c.get(1)?.as_str().trim().to_string())))
        .collect();

    let mut nets = Vec::new();
    for caps in ARIN_CIDR.captures_iter(response) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let parsed: Option<Vec<IpNet>> = value
            .as_str()
            .split(',')
            .map(|part| parse_network(part.trim()))
            .collect();
        let Some(parsed) = parsed.filter(|p| !p.is_empty()) else {
            debug!("Skipping invalid ARIN CIDR: {}", value.as_str());
            continue;
        };

        let range = ranges
            .iter()
            .rev()
            .find(|(start, _)| *start < whole.start())
            .map(|(_, range)| range.clone());

        nets.push(NetBlock {
            cidr: join_cidrs(&parsed),
            range,
            start: whole.start(),
            end: whole.end(),
        });
    }
    nets
}

/// Pads an abbreviated IPv4 prefix: `200.57/19` becomes `200.57.0.0/19`.
fn pad_lacnic_prefix(value: &str) -> String {
    let (addr, len) = match value.split_once('/') {
        Some((addr, len)) => (addr, Some(len)),
        None => (value, None),
    };
    let dots = addr.matches('.').count();
    let mut addr = addr.to_string();
    if dots > 0 && dots < 3 {
        for _ in dots..3 {
            addr.push_str(".0");
        }
    }
    match len {
        Some(len) => format!("{addr}/{len}"),
        None => addr,
    }
}

/// `inetnum`/`inet6num`/`route` lines with LACNIC's abbreviated prefixes.
pub(crate) fn get_nets_lacnic(response: &str) -> Vec<NetBlock> {
    let mut nets = Vec::new();
    for caps in LACNIC_NET.captures_iter(response) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let range = value.as_str().trim();

        let parsed: Option<Vec<IpNet>> = range
            .split(',')
            .map(|part| parse_network(&pad_lacnic_prefix(part.trim())))
            .collect();
        let Some(parsed) = parsed.filter(|p| !p.is_empty()) else {
            debug!("Skipping invalid LACNIC network: {range}");
            continue;
        };

        nets.push(NetBlock {
            cidr: join_cidrs(&parsed),
            range: Some(range.to_string()),
            start: whole.start(),
            end: whole.end(),
        });
    }
    nets
}

/// `inetnum`/`inet6num`/`route` lines holding a `start - end` range or a
/// single network (RIPE, APNIC, AFRINIC).
pub(crate) fn get_nets_other(response: &str) -> Vec<NetBlock> {
    let mut nets = Vec::new();
    for caps in OTHER_NET.captures_iter(response) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let range = value.as_str().trim();

        let parsed = match (caps.get(2), caps.get(3)) {
            (Some(first), Some(last)) => {
                let bounds = (
                    first.as_str().trim().parse::<IpAddr>(),
                    last.as_str().trim().parse::<IpAddr>(),
                );
                match bounds {
                    (Ok(first), Ok(last)) if first <= last => summarize_range(first, last),
                    _ => Vec::new(),
                }
            }
            _ => parse_network(range).into_iter().collect(),
        };

        if parsed.is_empty() {
            debug!("Skipping invalid network: {range}");
            continue;
        }

        nets.push(NetBlock {
            cidr: join_cidrs(&IpNet::aggregate(&parsed)),
            range: Some(range.to_string()),
            start: whole.start(),
            end: whole.end(),
        });
    }
    nets
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARIN: &str = "\
NetRange:       74.0.0.0 - 74.255.255.255
CIDR:           74.0.0.0/8
NetName:        NET74
NetHandle:      NET-74-0-0-0-0

NetRange:       74.125.0.0 - 74.125.255.255
CIDR:           74.125.0.0/16
NetName:        GOOGLE
";

    #[test]
    fn test_arin_blocks_and_ranges() {
        let nets = get_nets_arin(ARIN);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].cidr, "74.0.0.0/8");
        assert_eq!(nets[0].range.as_deref(), Some("74.0.0.0 - 74.255.255.255"));
        assert_eq!(nets[1].cidr, "74.125.0.0/16");
        assert_eq!(nets[1].range.as_deref(), Some("74.125.0.0 - 74.125.255.255"));
        assert!(nets[0].end < nets[1].start);
    }

    #[test]
    fn test_arin_multiple_cidrs() {
        let text = "NetRange: 10.0.0.0 - 10.0.2.255\nCIDR:           8.8.4.0/24, 8.8.8.0/24\n";
        let nets = get_nets_arin(text);
        assert_eq!(nets[0].cidr, "8.8.4.0/24, 8.8.8.0/24");
    }

    #[test]
    fn test_arin_invalid_cidr_skipped() {
        let nets = get_nets_arin("CIDR: 74.125.1.0/16\nCIDR: 300.1.1.0/24\n");
        assert!(nets.is_empty());
    }

    #[test]
    fn test_lacnic_padding() {
        assert_eq!(pad_lacnic_prefix("200.57/19"), "200.57.0.0/19");
        assert_eq!(pad_lacnic_prefix("177/8"), "177.0.0.0/8");
        assert_eq!(pad_lacnic_prefix("2801:10::/32"), "2801:10::/32");

        let nets = get_nets_lacnic("inetnum:     200.57/19\nstatus:   allocated\n");
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].cidr, "200.57.0.0/19");
        assert_eq!(nets[0].range.as_deref(), Some("200.57/19"));
    }

    #[test]
    fn test_other_range_summarized() {
        let text = "inetnum:        193.0.0.0 - 193.0.7.255\nnetname:  RIPE-NCC\n";
        let nets = get_nets_other(text);
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].cidr, "193.0.0.0/21");
        assert_eq!(nets[0].range.as_deref(), Some("193.0.0.0 - 193.0.7.255"));
    }

    #[test]
    fn test_other_uneven_range() {
        let nets = get_nets_other("inetnum: 1.0.0.0 - 1.0.2.255\n");
        assert_eq!(nets[0].cidr, "1.0.0.0/23, 1.0.2.0/24");
    }

    #[test]
    fn test_other_single_network() {
        let nets = get_nets_other("inet6num:       2001:67c:2e8::/48\nnetname: RIPE\n");
        assert_eq!(nets[0].cidr, "2001:67c:2e8::/48");
    }

    #[test]
    fn test_other_invalid_skipped() {
        assert!(get_nets_other("inetnum: 1.0.0.300 - 1.0.0.1\n").is_empty());
        assert!(get_nets_other("route: 10.0.0.1/8\n").is_empty());
    }
}
