//! IANA/IETF special-use address classification

use ipnet::{Ipv4Net, Ipv6Net};
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// A special-use block an address falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpecialUse {
    /// IETF assignment name
    pub name: &'static str,
    /// RFC that defines the block
    pub rfc: &'static str,
}

const fn special(name: &'static str, rfc: &'static str) -> SpecialUse {
    SpecialUse { name, rfc }
}

fn v4_table(entries: &[(&str, SpecialUse)]) -> Vec<(Ipv4Net, SpecialUse)> {
    entries
        .iter()
        .map(|(net, info)| (net.parse().expect("static IPv4 network"), *info))
        .collect()
}

fn v6_table(entries: &[(&str, SpecialUse)]) -> Vec<(Ipv6Net, SpecialUse)> {
    entries
        .iter()
        .map(|(net, info)| (net.parse().expect("static IPv6 network"), *info))
        .collect()
}

// Checked in order; the first containing block wins.
static IPV4_DEFINED: LazyLock<Vec<(Ipv4Net, SpecialUse)>> = LazyLock::new(|| {
    let this_network = special("This Network", "RFC 1122, Section 3.2.1.3");
    let private = special("Private-Use Networks", "RFC 1918");
    v4_table(&[
        ("0.0.0.0/8", this_network),
        ("127.0.0.0/8", special("Loopback", "RFC 1122, Section 3.2.1.3")),
        ("169.254.0.0/16", special("Link Local", "RFC 3927")),
        (
            "192.0.0.0/24",
            special("IETF Protocol Assignments", "RFC 5736"),
        ),
        ("192.0.2.0/24", special("TEST-NET-1", "RFC 5737")),
        ("192.88.99.0/24", special("6to4 Relay Anycast", "RFC 3068")),
        (
            "198.18.0.0/15",
            special(
                "Network Interconnect Device Benchmark Testing",
                "RFC 2544",
            ),
        ),
        ("198.51.100.0/24", special("TEST-NET-2", "RFC 5737")),
        ("203.0.113.0/24", special("TEST-NET-3", "RFC 5737")),
        ("224.0.0.0/4", special("Multicast", "RFC 3171")),
        (
            "255.255.255.255/32",
            special("Limited Broadcast", "RFC 919, Section 7"),
        ),
        ("10.0.0.0/8", private),
        ("172.16.0.0/12", private),
        ("192.168.0.0/16", private),
        ("100.64.0.0/10", special("Shared Address Space", "RFC 6598")),
    ])
});

static IPV6_DEFINED: LazyLock<Vec<(Ipv6Net, SpecialUse)>> = LazyLock::new(|| {
    let reserved = special("Reserved", "RFC 4291");
    v6_table(&[
        ("ff00::/8", special("Multicast", "RFC 4291, Section 2.7")),
        (
            "::/128",
            special("Unspecified", "RFC 4291, Section 2.5.2"),
        ),
        ("::1/128", special("Loopback", "RFC 4291, Section 2.5.3")),
        ("::/8", reserved),
        ("100::/8", reserved),
        ("200::/7", reserved),
        ("400::/6", reserved),
        ("800::/5", reserved),
        ("1000::/4", reserved),
        ("4000::/3", reserved),
        ("6000::/3", reserved),
        ("8000::/3", reserved),
        ("a000::/3", reserved),
        ("c000::/3", reserved),
        ("e000::/4", reserved),
        ("f000::/5", reserved),
        ("f800::/6", reserved),
        ("fe00::/9", reserved),
        ("fe80::/10", special("Link-Local", "RFC 4291, Section 2.5.6")),
        ("fec0::/10", special("Site-Local", "RFC 4291, Section 2.5.7")),
        ("fc00::/7", special("Unique Local Unicast", "RFC 4193")),
    ])
});

/// Returns the special-use block containing `addr`, if any.
///
/// # Examples
///
/// ```
/// use ipwhois::utils::ipv4_is_defined;
///
/// let info = ipv4_is_defined("192.168.1.1".parse().unwrap()).unwrap();
/// assert_eq!(info.name, "Private-Use Networks");
/// assert!(ipv4_is_defined("74.125.225.229".parse().unwrap()).is_none());
/// ```
pub fn ipv4_is_defined(addr: Ipv4Addr) -> Option<SpecialUse> {
    IPV4_DEFINED
        .iter()
        .find(|(net, _)| net.contains(&addr))
        .map(|(_, info)| *info)
}

/// Returns the special-use block containing `addr`, if any.
pub fn ipv6_is_defined(addr: Ipv6Addr) -> Option<SpecialUse> {
    IPV6_DEFINED
        .iter()
        .find(|(net, _)| net.contains(&addr))
        .map(|(_, info)| *info)
}
