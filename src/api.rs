//! High-level lookups combining ASN resolution with WHOIS or RDAP data
//!
//! ```no_run
//! use ipwhois::{IpWhois, LookupOptions, NetConfig};
//!
//! # async fn run() -> ipwhois::Result<()> {
//! let client = IpWhois::new("74.125.225.229", NetConfig::default())?;
//! let results = client.lookup_rdap(&LookupOptions::default()).await?;
//! println!("{}", results.rdap.network.cidr);
//! # Ok(())
//! # }
//! ```

use crate::asn::{AsnRecord, IpAsn};
use crate::config::{LookupOptions, NetConfig};
use crate::error::Result;
use crate::net::{Net, Transports};
use crate::nir::{Nir, NirResults, NirWhois};
use crate::rdap::{Rdap, RdapResults};
use crate::whois::{Whois, WhoisResults};
use serde::Serialize;
use tracing::debug;

/// Result of [`IpWhois::lookup_whois`]
#[derive(Debug, Clone, Serialize)]
pub struct WhoisLookup {
    /// ASN and registry data
    #[serde(flatten)]
    pub asn: AsnRecord,
    /// Parsed WHOIS data
    #[serde(flatten)]
    pub whois: WhoisResults,
    /// National registry data for JP/KR allocations
    pub nir: Option<NirResults>,
}

/// Result of [`IpWhois::lookup_rdap`]
#[derive(Debug, Clone, Serialize)]
pub struct RdapLookup {
    /// ASN and registry data; absent for bootstrap lookups
    #[serde(flatten)]
    pub asn: Option<AsnRecord>,
    /// Parsed RDAP data
    #[serde(flatten)]
    pub rdap: RdapResults,
    /// National registry data for JP/KR allocations
    pub nir: Option<NirResults>,
}

/// Ownership lookups for a single address
#[derive(Debug)]
pub struct IpWhois {
    net: Net,
}

impl IpWhois {
    /// Validates `address` and builds the default transports.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` or `IpDefined` for unusable addresses.
    pub fn new(address: &str, config: NetConfig) -> Result<Self> {
        Ok(Self {
            net: Net::new(address, config)?,
        })
    }

    /// Same as [`IpWhois::new`] with caller-supplied transports.
    pub fn with_transports(address: &str, config: NetConfig, transports: Transports) -> Result<Self> {
        Ok(Self {
            net: Net::with_transports(address, config, transports)?,
        })
    }

    /// The underlying query primitives
    pub fn net(&self) -> &Net {
        &self.net
    }

    /// Resolves the ASN, then queries the registry's legacy WHOIS server.
    pub async fn lookup_whois(&self, options: &LookupOptions) -> Result<WhoisLookup> {
        debug!("ASN lookup for {}", self.net.address_str());
        let asn = IpAsn::new(&self.net).lookup(options).await?;

        debug!("WHOIS lookup for {}", self.net.address_str());
        let whois = Whois::new(&self.net).lookup(options, &asn, None).await?;
        let nir = self
            .lookup_nir(options, asn.asn_country_code.as_deref())
            .await?;

        Ok(WhoisLookup { asn, whois, nir })
    }

    /// Resolves the ASN (unless bootstrapping), then queries RDAP.
    pub async fn lookup_rdap(&self, options: &LookupOptions) -> Result<RdapLookup> {
        let asn = if options.bootstrap {
            None
        } else {
            debug!("ASN lookup for {}", self.net.address_str());
            Some(IpAsn::new(&self.net).lookup(options).await?)
        };

        debug!("RDAP lookup for {}", self.net.address_str());
        let rdap = Rdap::new(&self.net)
            .lookup(options, asn.as_ref(), None)
            .await?;

        let country = asn
            .as_ref()
            .and_then(|a| a.asn_country_code.clone())
            .or_else(|| rdap.network.country.clone());
        let nir = self.lookup_nir(options, country.as_deref()).await?;

        Ok(RdapLookup { asn, rdap, nir })
    }

    async fn lookup_nir(
        &self,
        options: &LookupOptions,
        country: Option<&str>,
    ) -> Result<Option<NirResults>> {
        if !options.inc_nir {
            return Ok(None);
        }
        let Some(nir) = country.and_then(Nir::for_country) else {
            return Ok(None);
        };
        debug!("{nir} lookup for {}", self.net.address_str());
        let results = NirWhois::new(&self.net).lookup(nir, options, None).await?;
        Ok(Some(results))
    }
}
