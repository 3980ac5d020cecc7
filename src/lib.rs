//! ipwhois - IP address ownership lookups
//!
//! Resolves the ASN and registry of an address through Team Cymru (DNS,
//! WHOIS, then ARIN HTTP as a fallback), then retrieves network details
//! from the registry over legacy WHOIS or RDAP. Japanese and Korean
//! allocations can be enriched from JPNIC/KRNIC.

pub mod api;
pub mod asn;
pub mod config;
pub mod error;
pub mod experimental;
pub mod net;
pub mod nir;
pub mod rdap;
pub mod utils;
pub mod whois;

// Re-export core types for library users
pub use api::{IpWhois, RdapLookup, WhoisLookup};
pub use asn::{AsnRecord, IpAsn, Rir};
pub use config::{AsnMethod, LookupOptions, NetConfig};
pub use error::{IpWhoisError, Result};
pub use net::{Net, Transports};
