//! Bulk lookups: one Cymru WHOIS session for many addresses, then
//! sequential RDAP queries spread across registries

use crate::api::RdapLookup;
use crate::asn::{parse_fields_whois, AsnRecord, Rir};
use crate::config::timing::{
    whois_rate_limit_wait, DEFAULT_BULK_TIMEOUT_SECS, LACNIC_RATE_LIMIT_REQUESTS,
    LACNIC_RATE_LIMIT_WINDOW_SECS,
};
use crate::config::{LookupOptions, NetConfig};
use crate::error::{IpWhoisError, Result};
use crate::net::retry::{with_retries, Failure};
use crate::net::{Net, Transports, WhoisTransport, CYMRU_WHOIS};
use crate::rdap::Rdap;
use crate::utils::unique_everseen;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-registry counters for a bulk run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Addresses routed to this registry
    pub total: usize,
    /// Addresses whose lookup failed for good
    pub failed: usize,
    /// Rate-limit responses received
    pub rate_limited: usize,
}

/// Summary of a [`bulk_lookup_rdap`] run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkStats {
    /// Addresses passed in, duplicates included
    pub ip_input_total: usize,
    /// Distinct addresses
    pub ip_unique_total: usize,
    /// Addresses an RDAP lookup was attempted for
    pub ip_lookup_total: usize,
    /// Addresses that produced no result
    pub ip_failed_total: usize,
    /// Addresses Cymru reported without a usable registry
    pub unallocated_addresses: Vec<String>,
    /// Counters keyed by registry
    pub registries: BTreeMap<Rir, RegistryStats>,
}

/// Queries Team Cymru for many addresses over a single connection.
///
/// Returns the raw pipe-separated text, one line per address after a
/// `Bulk mode` header.
///
/// # Errors
///
/// [`IpWhoisError::AsnLookup`] once retries are exhausted.
pub async fn get_bulk_asn_whois(
    whois: &dyn WhoisTransport,
    addresses: &[String],
    retry_count: u32,
    timeout: Duration,
) -> Result<String> {
    let query = format!(" -r -a -c -p -f -o begin\n{}\nend", addresses.join("\n"));
    debug!("ASN bulk query for {} addresses", addresses.len());

    with_retries("ASN bulk", retry_count, whois_rate_limit_wait(), || async {
        whois
            .query(CYMRU_WHOIS, 43, &query, timeout)
            .await
            .map_err(|e| Failure::Transient(e.to_string()))
    })
    .await
    .map_err(|e| {
        e.into_error(
            |msg| IpWhoisError::AsnLookup(format!("ASN bulk lookup failed ({msg})")),
            || IpWhoisError::AsnLookup("ASN bulk lookup failed.".to_string()),
        )
    })
}

/// Splits bulk output into parsed records and addresses without a usable
/// registry.
fn parse_bulk_response(response: &str) -> (Vec<(String, AsnRecord)>, Vec<String>) {
    let mut records = Vec::new();
    let mut unallocated = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Bulk mode") {
            continue;
        }
        let Some(address) = line.split('|').nth(1).map(str::trim) else {
            debug!("Skipping bulk line: {line}");
            continue;
        };
        match parse_fields_whois(line) {
            Ok(record) => records.push((address.to_string(), record)),
            Err(e) => {
                debug!("No registry for {address}: {e}");
                unallocated.push(address.to_string());
            }
        }
    }
    (records, unallocated)
}

/// Fixed-window request limiter
#[derive(Debug)]
struct RateWindow {
    limit: u32,
    window: Duration,
    started: Option<Instant>,
    count: u32,
}

impl RateWindow {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            started: None,
            count: 0,
        }
    }

    /// Waits until another request fits in the window, then counts it.
    async fn acquire(&mut self) {
        let now = Instant::now();
        match self.started {
            Some(started) if now.duration_since(started) < self.window => {
                if self.count >= self.limit {
                    let resume = started + self.window;
                    debug!("Request window full, sleeping {:?}", resume - now);
                    tokio::time::sleep_until(resume).await;
                    self.started = Some(Instant::now());
                    self.count = 0;
                }
            }
            _ => {
                self.started = Some(now);
                self.count = 0;
            }
        }
        self.count += 1;
    }
}

/// Looks up many addresses over RDAP.
///
/// Duplicates are removed, registries come from a single
/// [`get_bulk_asn_whois`] query, then addresses are queried one at a time,
/// taking turns between registries. LACNIC is held to 9 requests per
/// minute. An address answered with a rate limit is queued once more.
///
/// # Errors
///
/// Only the bulk ASN query is fatal; per-address failures are counted in
/// [`BulkStats`].
pub async fn bulk_lookup_rdap(
    addresses: &[String],
    options: &LookupOptions,
    config: &NetConfig,
    transports: &Transports,
) -> Result<(BTreeMap<String, RdapLookup>, BulkStats)> {
    let unique = unique_everseen(addresses.iter().cloned());
    let mut stats = BulkStats {
        ip_input_total: addresses.len(),
        ip_unique_total: unique.len(),
        ..BulkStats::default()
    };
    let mut results = BTreeMap::new();
    if unique.is_empty() {
        return Ok((results, stats));
    }

    let response = get_bulk_asn_whois(
        transports.whois.as_ref(),
        &unique,
        options.retry_count,
        Duration::from_secs(DEFAULT_BULK_TIMEOUT_SECS),
    )
    .await?;
    let (records, unallocated) = parse_bulk_response(&response);
    stats.unallocated_addresses = unallocated;

    let mut queues: BTreeMap<Rir, VecDeque<(String, AsnRecord)>> = BTreeMap::new();
    for (address, record) in records {
        stats.registries.entry(record.asn_registry).or_default().total += 1;
        queues.entry(record.asn_registry).or_default().push_back((address, record));
    }

    let mut lacnic_window = RateWindow::new(
        LACNIC_RATE_LIMIT_REQUESTS,
        Duration::from_secs(LACNIC_RATE_LIMIT_WINDOW_SECS),
    );
    let mut requeued: HashSet<String> = HashSet::new();

    loop {
        let mut progressed = false;
        for (rir, queue) in queues.iter_mut() {
            let Some((address, record)) = queue.pop_front() else {
                continue;
            };
            progressed = true;
            if !requeued.contains(&address) {
                stats.ip_lookup_total += 1;
            }
            if *rir == Rir::Lacnic {
                lacnic_window.acquire().await;
            }

            let registry = stats.registries.entry(*rir).or_default();
            match lookup_one(&address, &record, options, config, transports).await {
                Ok(rdap) => {
                    results.insert(address, rdap);
                }
                Err(IpWhoisError::HttpRateLimit(url)) => {
                    registry.rate_limited += 1;
                    if requeued.insert(address.clone()) {
                        debug!("Rate limited by {url}, queueing {address} again");
                        queue.push_back((address, record));
                    } else {
                        warn!("Giving up on {address}: rate limited twice");
                        registry.failed += 1;
                        stats.ip_failed_total += 1;
                    }
                }
                Err(e) => {
                    warn!("RDAP lookup failed for {address}: {e}");
                    registry.failed += 1;
                    stats.ip_failed_total += 1;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    info!(
        "Bulk lookup done: {} looked up, {} failed, {} unallocated",
        stats.ip_lookup_total,
        stats.ip_failed_total,
        stats.unallocated_addresses.len()
    );
    Ok((results, stats))
}

async fn lookup_one(
    address: &str,
    record: &AsnRecord,
    options: &LookupOptions,
    config: &NetConfig,
    transports: &Transports,
) -> Result<RdapLookup> {
    let net = Net::with_transports(address, config.clone(), transports.clone())?;
    let rdap = Rdap::new(&net).lookup(options, Some(record), None).await?;
    Ok(RdapLookup {
        asn: Some(record.clone()),
        rdap,
        nir: None,
    })
}
