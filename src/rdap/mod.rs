//! RDAP lookups: the network object plus its entities, optionally
//! fetching nested entities up to a configured depth

pub mod objects;

pub use objects::{RdapContact, RdapContactValue, RdapEntity, RdapEvent, RdapNetwork, RdapNotice};

use crate::asn::{AsnRecord, Rir};
use crate::config::LookupOptions;
use crate::error::{IpWhoisError, Result};
use crate::net::Net;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Media type requested from RDAP servers
pub const RDAP_ACCEPT: &str = "application/rdap+json";

/// ARIN network endpoint used when ASN resolution is skipped; ARIN
/// redirects to the authoritative registry.
pub const BOOTSTRAP_URL: &str = "https://rdap.arin.net/registry/ip/{0}";

/// Parsed RDAP results for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdapResults {
    /// The queried address
    pub query: String,
    /// The network object
    pub network: RdapNetwork,
    /// Handles of the network's top-level entities
    pub entities: Vec<String>,
    /// Every parsed entity, keyed by handle
    pub objects: BTreeMap<String, RdapEntity>,
    /// The network JSON as received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// RDAP client for the address held by a [`Net`]
pub struct Rdap<'a> {
    net: &'a Net,
}

impl<'a> Rdap<'a> {
    /// Creates an RDAP client over `net`
    pub fn new(net: &'a Net) -> Self {
        Self { net }
    }

    /// Fetches (unless `response` is given) and parses the network object,
    /// then its entities.
    ///
    /// Without an ASN record, or with `options.bootstrap`, the network is
    /// requested from the ARIN bootstrap endpoint. Sub-entities are
    /// fetched level by level for `options.depth` levels.
    pub async fn lookup(
        &self,
        options: &LookupOptions,
        asn: Option<&AsnRecord>,
        response: Option<Value>,
    ) -> Result<RdapResults> {
        let registry = match asn {
            Some(record) if !options.bootstrap => Some(record.asn_registry),
            _ => None,
        };

        let response = match response {
            Some(response) => {
                debug!("Response given, skipping RDAP query for {}", self.net.address_str());
                response
            }
            None => {
                let url = match registry {
                    Some(rir) => rir.rdap_ip_url(self.net.address_str()),
                    None => BOOTSTRAP_URL.replace("{0}", self.net.address_str()),
                };
                debug!("Response not given, perform RDAP lookup for {url}");
                self.net
                    .get_http_json(&url, options.retry_count, options.rate_limit_timeout, RDAP_ACCEPT)
                    .await?
            }
        };

        let network = RdapNetwork::from_json(&response)?;
        let mut entities = Vec::new();
        let mut objects = BTreeMap::new();

        for value in response
            .get("entities")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let entity = match RdapEntity::from_json(value) {
                Ok(entity) => entity,
                Err(e) => {
                    debug!("Skipping entity: {e}");
                    continue;
                }
            };
            if options.excluded_entities.contains(&entity.handle) {
                continue;
            }
            if !entities.contains(&entity.handle) {
                entities.push(entity.handle.clone());
            }
            objects.entry(entity.handle.clone()).or_insert(entity);
        }

        let entity_registry = registry.unwrap_or(Rir::Arin);
        let mut pending = self.pending_handles(options, &objects, objects.values());
        for level in 0..options.depth {
            if pending.is_empty() {
                break;
            }
            debug!("Fetching {} sub-entities at depth {}", pending.len(), level + 1);
            let mut fetched = Vec::new();
            for handle in pending {
                if objects.contains_key(&handle) {
                    continue;
                }
                if let Some(entity) = self.fetch_entity(entity_registry, &handle, options).await? {
                    fetched.push(entity.handle.clone());
                    objects.insert(entity.handle.clone(), entity);
                }
            }
            pending = self.pending_handles(
                options,
                &objects,
                fetched.iter().filter_map(|h| objects.get(h)),
            );
        }

        Ok(RdapResults {
            query: self.net.address_str().to_string(),
            network,
            entities,
            objects,
            raw: options.inc_raw.then_some(response),
        })
    }

    fn pending_handles<'e>(
        &self,
        options: &LookupOptions,
        known: &BTreeMap<String, RdapEntity>,
        parents: impl Iterator<Item = &'e RdapEntity>,
    ) -> Vec<String> {
        let mut handles = Vec::new();
        for handle in parents.flat_map(|e| e.entities.iter()) {
            if known.contains_key(handle)
                || options.excluded_entities.contains(handle)
                || handles.contains(handle)
            {
                continue;
            }
            handles.push(handle.clone());
        }
        handles
    }

    async fn fetch_entity(
        &self,
        registry: Rir,
        handle: &str,
        options: &LookupOptions,
    ) -> Result<Option<RdapEntity>> {
        let url = registry.rdap_entity_url(handle);
        let response = match self
            .net
            .get_http_json(&url, options.retry_count, options.rate_limit_timeout, RDAP_ACCEPT)
            .await
        {
            Ok(response) => response,
            Err(IpWhoisError::HttpLookup(msg)) => {
                warn!("Entity {handle} unavailable: {msg}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match RdapEntity::from_json(&response) {
            Ok(entity) => Ok(Some(entity)),
            Err(e) => {
                debug!("Skipping entity {handle}: {e}");
                Ok(None)
            }
        }
    }
}
