//! Address utilities: special-use classification, CIDR math, country names,
//! de-duplication and random address generation

pub mod addresses;
pub mod cidr;
pub mod countries;
pub mod defined;
pub mod random;

pub use addresses::{unique_addresses, unique_everseen, AddressCount};
pub use cidr::{calculate_cidr, ipv4_lstrip_zeros, parse_network, summarize_range};
pub use countries::{country_name, get_countries};
pub use defined::{ipv4_is_defined, ipv6_is_defined, SpecialUse};
pub use random::{ipv4_generate_random, ipv6_generate_random};

use std::net::IpAddr;

/// Special-use block for either address family
pub fn ip_is_defined(addr: IpAddr) -> Option<SpecialUse> {
    match addr {
        IpAddr::V4(v4) => ipv4_is_defined(v4),
        IpAddr::V6(v6) => ipv6_is_defined(v6),
    }
}
