//! ipwhois-utils - address helpers from the command line.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ipwhois::utils::{
    calculate_cidr, country_name, get_countries, ipv4_generate_random, ipv4_is_defined,
    ipv4_lstrip_zeros, ipv6_generate_random, ipv6_is_defined, unique_addresses, unique_everseen,
    SpecialUse,
};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

/// Command-line arguments for the utility tool.
#[derive(Parser, Debug)]
#[clap(author, version, about = "IP address utilities from ipwhois", long_about = None)]
struct Args {
    /// Output results in JSON format
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Strip leading zeros from each IPv4 octet
    LstripZeros {
        /// IPv4 address, e.g. 074.125.025.229
        address: String,
    },
    /// Minimal CIDR list covering an address range
    CalculateCidr {
        /// First address
        start: String,
        /// Last address
        end: String,
    },
    /// ISO 3166-1 country codes and names
    Countries,
    /// Country name for a two-letter code
    Country {
        /// Country code, e.g. US
        code: String,
    },
    /// Special-use block of an IPv4 address
    Ipv4IsDefined {
        /// IPv4 address
        address: Ipv4Addr,
    },
    /// Special-use block of an IPv6 address
    Ipv6IsDefined {
        /// IPv6 address
        address: Ipv6Addr,
    },
    /// Random IPv4 addresses outside special-use blocks
    Ipv4GenerateRandom {
        /// How many addresses
        total: usize,
    },
    /// Random IPv6 addresses outside special-use blocks
    Ipv6GenerateRandom {
        /// How many addresses
        total: usize,
    },
    /// Unique items in order of first appearance
    UniqueEverseen {
        /// Items; a single argument is split into characters
        items: Vec<String>,
    },
    /// Count the addresses and networks found in a text file
    UniqueAddresses {
        /// File to scan
        file: PathBuf,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_defined(address: &str, found: Option<SpecialUse>, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "address": address,
            "defined": found.is_some(),
            "name": found.map(|s| s.name),
            "rfc": found.map(|s| s.rfc),
        }));
    }
    match found {
        Some(special) => println!("{} is defined as {} via {}", address, special.name, special.rfc),
        None => println!("{} is not defined", address),
    }
    Ok(())
}

fn print_list<T: std::fmt::Display + serde::Serialize>(items: &[T], json: bool) -> Result<()> {
    if json {
        return print_json(&items);
    }
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let json = args.json;
    match args.command {
        Command::LstripZeros { address } => println!("{}", ipv4_lstrip_zeros(&address)),
        Command::CalculateCidr { start, end } => {
            print_list(&calculate_cidr(&start, &end)?, json)?;
        }
        Command::Countries => {
            let countries = get_countries();
            if json {
                print_json(countries)?;
            } else {
                for (code, name) in countries {
                    println!("{}: {}", code, name);
                }
            }
        }
        Command::Country { code } => {
            let name = country_name(&code)
                .with_context(|| format!("unknown country code {}", code))?;
            println!("{}", name);
        }
        Command::Ipv4IsDefined { address } => {
            print_defined(&address.to_string(), ipv4_is_defined(address), json)?;
        }
        Command::Ipv6IsDefined { address } => {
            print_defined(&address.to_string(), ipv6_is_defined(address), json)?;
        }
        Command::Ipv4GenerateRandom { total } => print_list(&ipv4_generate_random(total), json)?,
        Command::Ipv6GenerateRandom { total } => print_list(&ipv6_generate_random(total), json)?,
        Command::UniqueEverseen { items } => {
            let unique = if let [single] = items.as_slice() {
                unique_everseen(single.chars().map(String::from))
            } else {
                unique_everseen(items)
            };
            print_list(&unique, json)?;
        }
        Command::UniqueAddresses { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let found = unique_addresses(&data);
            if json {
                print_json(&found)?;
            } else {
                for (address, counts) in &found {
                    let ports: Vec<String> = counts
                        .ports
                        .iter()
                        .map(|(port, n)| format!("{}x{}", port, n))
                        .collect();
                    if ports.is_empty() {
                        println!("{}: {}", address, counts.count);
                    } else {
                        println!("{}: {} (ports {})", address, counts.count, ports.join(", "));
                    }
                }
            }
        }
    }
    Ok(())
}
