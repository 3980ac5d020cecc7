//! Random public address generation

use super::defined::{ipv4_is_defined, ipv6_is_defined};
use rand::Rng;
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

// Skip 0.0.0.0/8 and the IPv6 blocks below 0100::/8.
const IPV4_LOWER: u32 = 16_777_216;
const IPV6_LOWER: u128 = 72_057_594_037_927_936;

/// Generates `total` unique random IPv4 addresses outside special-use blocks.
pub fn ipv4_generate_random(total: usize) -> Vec<Ipv4Addr> {
    let mut rng = rand::rng();
    let mut seen = HashSet::with_capacity(total);
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let addr = Ipv4Addr::from(rng.random_range(IPV4_LOWER..=u32::MAX));
        if ipv4_is_defined(addr).is_none() && seen.insert(addr) {
            out.push(addr);
        }
    }
    out
}

/// Generates `total` unique random IPv6 addresses outside special-use blocks.
pub fn ipv6_generate_random(total: usize) -> Vec<Ipv6Addr> {
    let mut rng = rand::rng();
    let mut seen = HashSet::with_capacity(total);
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let addr = Ipv6Addr::from(rng.random_range(IPV6_LOWER..=u128::MAX));
        if ipv6_is_defined(addr).is_none() && seen.insert(addr) {
            out.push(addr);
        }
    }
    out
}
