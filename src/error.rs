//! Error types for IP ownership lookups

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IpWhoisError>;

/// Errors that can occur during lookups
#[derive(Debug, Error)]
pub enum IpWhoisError {
    /// The input could not be parsed as an IPv4 or IPv6 address
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// The address belongs to an IANA/IETF special-use block
    ///
    /// Raised before any network I/O is attempted.
    #[error("IPv{version} address {address} is already defined as {name} via {rfc}.")]
    IpDefined {
        /// The offending address
        address: String,
        /// IP version (4 or 6)
        version: u8,
        /// IETF name of the block (e.g. "Private-Use Networks")
        name: String,
        /// RFC reference for the block
        rfc: String,
    },

    /// An ASN lookup query failed (DNS, WHOIS or HTTP)
    #[error("{0}")]
    AsnLookup(String),

    /// No usable registry was found for the address
    #[error("{0}")]
    AsnRegistry(String),

    /// The ASN response could not be parsed
    #[error("Parsing failed for {0}")]
    AsnParse(String),

    /// Looking up the routes originated by an ASN failed
    #[error("{0}")]
    AsnOriginLookup(String),

    /// A WHOIS query failed after exhausting retries
    #[error("WHOIS lookup failed for {0}.")]
    WhoisLookup(String),

    /// A WHOIS server kept answering with its rate-limit banner
    #[error("Whois lookup failed for {0}. Rate limit exceeded, wait and try again (possibly a temporary block).")]
    WhoisRateLimit(String),

    /// An HTTP/RDAP query failed after exhausting retries
    #[error("HTTP lookup failed for {0}.")]
    HttpLookup(String),

    /// An HTTP/RDAP endpoint kept answering with HTTP 429
    #[error("HTTP lookup failed for {0}. Rate limit exceeded, wait and try again (possibly a temporary block).")]
    HttpRateLimit(String),

    /// A reverse DNS (PTR) lookup failed
    #[error("Host lookup failed for {0}.")]
    HostLookup(String),

    /// The WHOIS server is on the blacklist
    #[error("The server {0} is blacklisted.")]
    Blacklist(String),

    /// An RDAP network object is missing required data
    #[error("Invalid RDAP network object: {0}")]
    InvalidNetworkObject(String),

    /// An RDAP entity object is missing required data
    #[error("Invalid RDAP entity object: {0}")]
    InvalidEntityObject(String),

    /// An RDAP entity carries a malformed vCard
    #[error("Invalid RDAP entity contact object: {0}")]
    InvalidEntityContactObject(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl IpWhoisError {
    /// Whether this error is one of the ASN resolution failures the
    /// fallback chain is allowed to step over
    pub fn is_asn_fallthrough(&self) -> bool {
        matches!(
            self,
            Self::AsnLookup(_) | Self::AsnRegistry(_) | Self::AsnParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_message_names_block() {
        let err = IpWhoisError::IpDefined {
            address: "127.0.0.1".to_string(),
            version: 4,
            name: "Loopback".to_string(),
            rfc: "RFC 1122, Section 3.2.1.3".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("IPv4 address 127.0.0.1"));
        assert!(msg.contains("Loopback"));
        assert!(msg.contains("RFC 1122"));
    }

    #[test]
    fn test_fallthrough_classification() {
        assert!(IpWhoisError::AsnLookup("x".into()).is_asn_fallthrough());
        assert!(IpWhoisError::AsnParse("x".into()).is_asn_fallthrough());
        assert!(!IpWhoisError::Blacklist("x".into()).is_asn_fallthrough());
        assert!(!IpWhoisError::Config("x".into()).is_asn_fallthrough());
    }
}
