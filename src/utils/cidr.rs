//! CIDR helpers used by the WHOIS and RDAP parsers

use crate::error::{IpWhoisError, Result};
use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};
use std::net::IpAddr;

/// Strips leading zeros from each octet of an IPv4 address.
///
/// Some registries zero-pad octets (`074.125.025.229`), which the standard
/// parser rejects. A trailing `/len` is dropped.
///
/// # Examples
///
/// ```
/// use ipwhois::utils::ipv4_lstrip_zeros;
///
/// assert_eq!(ipv4_lstrip_zeros("074.125.025.229"), "74.125.25.229");
/// ```
pub fn ipv4_lstrip_zeros(address: &str) -> String {
    address
        .trim()
        .split('.')
        .map(|octet| {
            let octet = octet.split('/').next().unwrap_or_default();
            let stripped = octet.trim_start_matches('0');
            if stripped.is_empty() {
                "0"
            } else {
                stripped
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Minimal list of networks covering `start..=end`.
///
/// Returns an empty list for mixed address families or a reversed range.
pub fn summarize_range(start: IpAddr, end: IpAddr) -> Vec<IpNet> {
    match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) if s <= e => {
            Ipv4Subnets::new(s, e, 0).map(IpNet::V4).collect()
        }
        (IpAddr::V6(s), IpAddr::V6(e)) if s <= e => {
            Ipv6Subnets::new(s, e, 0).map(IpNet::V6).collect()
        }
        _ => Vec::new(),
    }
}

/// Calculates the collapsed CIDR list for an address range given as text.
///
/// # Examples
///
/// ```
/// use ipwhois::utils::calculate_cidr;
///
/// let cidrs = calculate_cidr("192.168.0.9", "192.168.5.4").unwrap();
/// assert_eq!(cidrs.first().map(String::as_str), Some("192.168.0.9/32"));
/// ```
pub fn calculate_cidr(start: &str, end: &str) -> Result<Vec<String>> {
    let parse = |s: &str| {
        s.trim()
            .parse::<IpAddr>()
            .map_err(|_| IpWhoisError::InvalidAddress(s.to_string()))
    };
    let (first, last) = (parse(start)?, parse(end)?);
    let nets = summarize_range(first, last);
    if nets.is_empty() {
        return Err(IpWhoisError::InvalidAddress(format!("{start} - {end}")));
    }
    Ok(IpNet::aggregate(&nets)
        .into_iter()
        .map(|n| n.to_string())
        .collect())
}

/// Parses a network in strict form: host bits must be zero.
///
/// A bare address is treated as a single-host network.
pub fn parse_network(text: &str) -> Option<IpNet> {
    let text = text.trim();
    if text.contains('/') {
        let net: IpNet = text.parse().ok()?;
        (net.trunc() == net).then_some(net)
    } else {
        let addr: IpAddr = text.parse().ok()?;
        let len = if addr.is_ipv4() { 32 } else { 128 };
        IpNet::new(addr, len).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_u32(addr: IpAddr) -> u32 {
        match addr {
            IpAddr::V4(a) => u32::from(a),
            IpAddr::V6(_) => unreachable!(),
        }
    }

    #[test]
    fn test_lstrip_zeros() {
        assert_eq!(ipv4_lstrip_zeros("074.125.025.229"), "74.125.25.229");
        assert_eq!(ipv4_lstrip_zeros("000.000.000.000"), "0.0.0.0");
        assert_eq!(ipv4_lstrip_zeros("10.001.000.010/24"), "10.1.0.10");
    }

    #[test]
    fn test_calculate_cidr_covers_exact_range() {
        let start: IpAddr = "192.168.0.9".parse().unwrap();
        let end: IpAddr = "192.168.5.4".parse().unwrap();
        let cidrs = calculate_cidr("192.168.0.9", "192.168.5.4").unwrap();

        let mut nets: Vec<IpNet> = cidrs.iter().map(|c| c.parse().unwrap()).collect();
        nets.sort();
        assert_eq!(nets.first().unwrap().network(), start);
        assert_eq!(nets.last().unwrap().broadcast(), end);
        for pair in nets.windows(2) {
            assert_eq!(to_u32(pair[0].broadcast()) + 1, to_u32(pair[1].network()));
        }
    }

    #[test]
    fn test_calculate_cidr_single_block() {
        assert_eq!(
            calculate_cidr("74.125.0.0", "74.125.255.255").unwrap(),
            vec!["74.125.0.0/16"]
        );
        assert_eq!(
            calculate_cidr("2001:db8::", "2001:db8::ffff").unwrap(),
            vec!["2001:db8::/112"]
        );
    }

    #[test]
    fn test_calculate_cidr_rejects_bad_ranges() {
        assert!(calculate_cidr("10.0.0.5", "10.0.0.1").is_err());
        assert!(calculate_cidr("10.0.0.1", "::1").is_err());
        assert!(calculate_cidr("nope", "10.0.0.1").is_err());
    }

    #[test]
    fn test_parse_network_strict() {
        assert_eq!(
            parse_network("74.125.0.0/16").unwrap().to_string(),
            "74.125.0.0/16"
        );
        assert!(parse_network("74.125.1.0/16").is_none());
        assert!(parse_network("74.125.1.256/24").is_none());
        assert_eq!(
            parse_network(" 2001:db8::/32 ").unwrap().to_string(),
            "2001:db8::/32"
        );
        assert_eq!(parse_network("1.2.3.4").unwrap().to_string(), "1.2.3.4/32");
    }
}
