//! ASN resolution and ASN origin lookups

pub mod lookup;
pub mod origin;
pub mod registry;

pub use lookup::{
    parse_fields_dns, parse_fields_dns_records, parse_fields_http, parse_fields_verbose_dns,
    parse_fields_whois, AsnRecord, IpAsn,
};
pub use origin::{
    normalize_asn, parse_asn_origin, AsnOrigin, AsnOriginField, AsnOriginNet, AsnOriginOptions,
    AsnOriginResults,
};
pub use registry::{registry_for_org_handle, Rir};
