//! ipwhois - IP address ownership lookups from the command line.
//!
//! Runs an RDAP (default) or legacy WHOIS lookup for one address and prints
//! the result as text or JSON.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::Parser;
use ipwhois::nir::{NirField, NirResults};
use ipwhois::whois::WhoisField;
use ipwhois::{AsnMethod, AsnRecord, IpWhois, LookupOptions, NetConfig, RdapLookup, WhoisLookup};
use std::collections::HashMap;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Get the version string for ipwhois
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for the lookup tool.
#[derive(Parser, Debug)]
#[clap(author, version, about = "IP address ownership lookups via RDAP or WHOIS", long_about = None)]
struct Args {
    /// IPv4 or IPv6 address to look up
    #[clap(long)]
    addr: String,

    /// Use legacy WHOIS instead of RDAP
    #[clap(long)]
    whois: bool,

    /// Skip JPNIC/KRNIC lookups
    #[clap(long)]
    exclude_nir: bool,

    /// Output results in JSON format
    #[clap(long)]
    json: bool,

    /// Per-query timeout in seconds
    #[clap(long, default_value_t = 5)]
    timeout: u64,

    /// HTTP proxy URL
    #[clap(long)]
    proxy_http: Option<String>,

    /// HTTPS proxy URL
    #[clap(long)]
    proxy_https: Option<String>,

    /// Include raw responses
    #[clap(long)]
    inc_raw: bool,

    /// Retries for each failed query
    #[clap(long, default_value_t = 3)]
    retry_count: u32,

    /// ASN lookup methods in order (dns, whois, http)
    #[clap(long, value_enum, value_delimiter = ',')]
    asn_methods: Vec<AsnMethodArg>,

    /// Extra ARIN org handle to registry mappings as JSON, e.g. '{"DNIC": "arin"}'
    #[clap(long)]
    extra_org_map: Option<String>,

    /// Do not fetch the ASN description after a DNS lookup
    #[clap(long)]
    skip_asn_description: bool,

    /// Levels of RDAP sub-entities to fetch
    #[clap(long, default_value_t = 0)]
    depth: u32,

    /// RDAP entity handles to skip, comma separated
    #[clap(long, value_delimiter = ',')]
    excluded_entities: Vec<String>,

    /// Query the ARIN RDAP bootstrap and skip ASN resolution
    #[clap(long)]
    bootstrap: bool,

    /// Seconds to wait after an RDAP rate-limit response
    #[clap(long, default_value_t = 120)]
    rate_limit_timeout: u64,

    /// Follow WHOIS referral servers
    #[clap(long)]
    get_referral: bool,

    /// WHOIS servers never to query, comma separated
    #[clap(long, value_delimiter = ',')]
    extra_blacklist: Vec<String>,

    /// Ignore errors from referral servers
    #[clap(long)]
    ignore_referral_errors: bool,

    /// WHOIS fields to parse, comma separated
    #[clap(long, value_delimiter = ',')]
    field_list: Vec<String>,

    /// NIR fields to parse, comma separated
    #[clap(long, value_delimiter = ',')]
    nir_field_list: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum AsnMethodArg {
    Dns,
    Whois,
    Http,
}

impl From<AsnMethodArg> for AsnMethod {
    fn from(arg: AsnMethodArg) -> Self {
        match arg {
            AsnMethodArg::Dns => AsnMethod::Dns,
            AsnMethodArg::Whois => AsnMethod::Whois,
            AsnMethodArg::Http => AsnMethod::Http,
        }
    }
}

fn main() {
    // Quick check for version before starting async runtime
    let args: Vec<String> = std::env::args().collect();
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-V") {
        println!("ipwhois {}", get_version());
        return;
    }

    let args = Args::parse();
    init_tracing(args.verbose);

    // Create single-threaded tokio runtime; lookups are sequential
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    if let Err(e) = runtime.block_on(async_main(args)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ipwhois={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_net_config(args: &Args) -> Result<NetConfig> {
    let mut builder = NetConfig::builder().timeout(Duration::from_secs(args.timeout));
    if let Some(proxy) = &args.proxy_http {
        builder = builder.proxy_http(proxy);
    }
    if let Some(proxy) = &args.proxy_https {
        builder = builder.proxy_https(proxy);
    }
    builder.build().map_err(anyhow::Error::msg)
}

fn parse_list<T>(values: &[String]) -> Result<Option<Vec<T>>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|v| v.parse::<T>().map_err(|e| anyhow::anyhow!("{}", e)))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn build_options(args: &Args) -> Result<LookupOptions> {
    let extra_org_map: HashMap<String, String> = match &args.extra_org_map {
        Some(json) => serde_json::from_str(json).context("--extra-org-map must be a JSON object")?,
        None => HashMap::new(),
    };

    let mut builder = LookupOptions::builder()
        .inc_raw(args.inc_raw)
        .retry_count(args.retry_count)
        .extra_org_map(extra_org_map)
        .get_asn_description(!args.skip_asn_description)
        .inc_nir(!args.exclude_nir)
        .get_referral(args.get_referral)
        .extra_blacklist(args.extra_blacklist.clone())
        .ignore_referral_errors(args.ignore_referral_errors)
        .depth(args.depth)
        .excluded_entities(args.excluded_entities.clone())
        .bootstrap(args.bootstrap)
        .rate_limit_timeout(Duration::from_secs(args.rate_limit_timeout));

    if !args.asn_methods.is_empty() {
        builder = builder.asn_methods(args.asn_methods.iter().map(|&m| m.into()).collect());
    }
    if let Some(fields) = parse_list::<WhoisField>(&args.field_list)? {
        builder = builder.field_list(fields);
    }
    if let Some(fields) = parse_list::<NirField>(&args.nir_field_list)? {
        builder = builder.nir_field_list(fields);
    }
    builder.build().map_err(anyhow::Error::msg)
}

async fn async_main(args: Args) -> Result<()> {
    let config = build_net_config(&args)?;
    let options = build_options(&args)?;
    let client = IpWhois::new(&args.addr, config)?;

    if args.whois {
        let results = client.lookup_whois(&options).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            display_whois(&results);
        }
    } else {
        let results = client.lookup_rdap(&options).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            display_rdap(&results);
        }
    }
    Ok(())
}

fn line(label: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("{:<14} {}", format!("{}:", label), value.replace('\n', "\n               "));
    }
}

fn display_asn(asn: &AsnRecord) {
    line("ASN", asn.asn.as_deref());
    line("ASN CIDR", asn.asn_cidr.as_deref());
    line("ASN Registry", Some(asn.asn_registry.as_str()));
    line("ASN Country", asn.asn_country_code.as_deref());
    line("ASN Date", asn.asn_date.as_deref());
    line("ASN Name", asn.asn_description.as_deref());
}

fn display_nir(nir: &NirResults) {
    println!("\n{} networks:", nir.nir.as_str().to_uppercase());
    for net in &nir.nets {
        println!();
        line("CIDR", Some(&net.cidr));
        line("Range", Some(&net.range));
        line("Name", net.name.as_deref());
        line("Handle", net.handle.as_deref());
        line("Country", Some(&net.country));
        line("Address", net.address.as_deref());
        line("Created", net.created.as_deref());
        line("Updated", net.updated.as_deref());
    }
}

fn display_whois(results: &WhoisLookup) {
    line("Query", Some(&results.whois.query));
    display_asn(&results.asn);

    for net in &results.whois.nets {
        println!();
        line("CIDR", Some(&net.cidr));
        line("Range", net.range.as_deref());
        line("Name", net.fields.name.as_deref());
        line("Handle", net.fields.handle.as_deref());
        line("Description", net.fields.description.as_deref());
        line("Country", net.fields.country.as_deref());
        line("Address", net.fields.address.as_deref());
        line("Emails", net.fields.emails.as_ref().map(|e| e.join(", ")).as_deref());
        line("Created", net.fields.created.as_deref());
        line("Updated", net.fields.updated.as_deref());
    }

    if let Some(referral) = &results.whois.referral {
        println!("\nReferral {}:{}", referral.server, referral.port);
        line("CIDR", referral.cidr.as_deref());
        line("Name", referral.fields.name.as_deref());
        line("Address", referral.fields.address.as_deref());
    }
    if let Some(nir) = &results.nir {
        display_nir(nir);
    }
}

fn display_rdap(results: &RdapLookup) {
    line("Query", Some(&results.rdap.query));
    if let Some(asn) = &results.asn {
        display_asn(asn);
    }

    let network = &results.rdap.network;
    println!();
    line("Handle", Some(&network.handle));
    line("CIDR", Some(&network.cidr));
    line("Name", network.name.as_deref());
    line("Type", network.kind.as_deref());
    line("Country", network.country.as_deref());
    line("Parent", network.parent_handle.as_deref());
    for event in &network.events {
        line(&event.action, Some(&event.timestamp));
    }

    for (handle, entity) in &results.rdap.objects {
        println!("\nEntity {} [{}]", handle, entity.roles.join(", "));
        if let Some(contact) = &entity.contact {
            line("Name", contact.name.as_deref());
            for address in &contact.address {
                line("Address", Some(&address.value));
            }
            for email in &contact.email {
                line("Email", Some(&email.value));
            }
            for phone in &contact.phone {
                line("Phone", Some(&phone.value));
            }
        }
    }
    if let Some(nir) = &results.nir {
        display_nir(nir);
    }
}
