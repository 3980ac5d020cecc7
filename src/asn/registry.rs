//! Regional Internet Registries and their endpoints

use crate::error::IpWhoisError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A Regional Internet Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rir {
    /// American Registry for Internet Numbers
    Arin,
    /// RIPE Network Coordination Centre
    Ripencc,
    /// Asia-Pacific Network Information Centre
    Apnic,
    /// Latin America and Caribbean Network Information Centre
    Lacnic,
    /// African Network Information Centre
    Afrinic,
}

impl Rir {
    /// All registries
    pub const ALL: [Rir; 5] = [Rir::Arin, Rir::Ripencc, Rir::Apnic, Rir::Lacnic, Rir::Afrinic];

    /// Name as used by Team Cymru (`arin`, `ripencc`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            Rir::Arin => "arin",
            Rir::Ripencc => "ripencc",
            Rir::Apnic => "apnic",
            Rir::Lacnic => "lacnic",
            Rir::Afrinic => "afrinic",
        }
    }

    /// Legacy WHOIS server on port 43
    pub fn whois_server(self) -> &'static str {
        match self {
            Rir::Arin => "whois.arin.net",
            Rir::Ripencc => "whois.ripe.net",
            Rir::Apnic => "whois.apnic.net",
            Rir::Lacnic => "whois.lacnic.net",
            Rir::Afrinic => "whois.afrinic.net",
        }
    }

    fn rdap_base(self) -> &'static str {
        match self {
            Rir::Arin => "https://rdap.arin.net/registry",
            Rir::Ripencc => "https://rdap.db.ripe.net",
            Rir::Apnic => "https://rdap.apnic.net",
            Rir::Lacnic => "https://rdap.lacnic.net/rdap",
            Rir::Afrinic => "https://rdap.afrinic.net/rdap",
        }
    }

    /// RDAP network URL for `address`
    pub fn rdap_ip_url(self, address: &str) -> String {
        format!("{}/ip/{address}", self.rdap_base())
    }

    /// RDAP entity URL for `handle`
    pub fn rdap_entity_url(self, handle: &str) -> String {
        format!("{}/entity/{handle}", self.rdap_base())
    }

    /// `strftime`-style format of `created`/`updated` values in WHOIS text
    pub fn whois_date_format(self) -> Option<&'static str> {
        match self {
            Rir::Arin => Some("%Y-%m-%d"),
            Rir::Ripencc => Some("%Y-%m-%dT%H:%M:%SZ"),
            Rir::Apnic | Rir::Lacnic => Some("%Y%m%d"),
            Rir::Afrinic => None,
        }
    }
}

impl fmt::Display for Rir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rir {
    type Err = IpWhoisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arin" => Ok(Rir::Arin),
            "ripencc" => Ok(Rir::Ripencc),
            "apnic" => Ok(Rir::Apnic),
            "lacnic" => Ok(Rir::Lacnic),
            "afrinic" => Ok(Rir::Afrinic),
            other => Err(IpWhoisError::AsnRegistry(format!(
                "ASN registry {other} is not known."
            ))),
        }
    }
}

const ORG_MAP: [(&str, Rir); 7] = [
    ("ARIN", Rir::Arin),
    ("VR-ARIN", Rir::Arin),
    ("RIPE", Rir::Ripencc),
    ("APNIC", Rir::Apnic),
    ("LACNIC", Rir::Lacnic),
    ("AFRINIC", Rir::Afrinic),
    ("DNIC", Rir::Arin),
];

/// Maps an ARIN `orgRef` handle to the registry that administers it.
///
/// `extra` entries take precedence over the built-in table.
pub fn registry_for_org_handle(handle: &str, extra: &HashMap<String, String>) -> Option<Rir> {
    let handle = handle.trim().to_uppercase();
    if let Some(value) = extra
        .iter()
        .find(|(k, _)| k.to_uppercase() == handle)
        .map(|(_, v)| v)
    {
        return value.parse().ok();
    }
    ORG_MAP
        .iter()
        .find(|(k, _)| *k == handle)
        .map(|(_, rir)| *rir)
}
