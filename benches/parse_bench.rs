use criterion::{criterion_group, criterion_main, Criterion};
use ipwhois::asn::{parse_fields_whois, Rir};
use ipwhois::rdap::RdapNetwork;
use ipwhois::utils::{calculate_cidr, unique_addresses};
use ipwhois::whois::parse_whois;
use std::hint::black_box;

const ARIN: &str = include_str!("../tests/fixtures/arin.txt");
const RIPENCC: &str = include_str!("../tests/fixtures/ripencc.txt");
const LACNIC: &str = include_str!("../tests/fixtures/lacnic.txt");
const RDAP_NETWORK: &str = include_str!("../tests/fixtures/rdap_arin_network.json");

fn benchmark_whois_parsing(c: &mut Criterion) {
    c.bench_function("parse_whois_arin", |b| {
        b.iter(|| parse_whois(Rir::Arin, black_box(ARIN), None))
    });

    c.bench_function("parse_whois_ripencc", |b| {
        b.iter(|| parse_whois(Rir::Ripencc, black_box(RIPENCC), None))
    });

    c.bench_function("parse_whois_lacnic", |b| {
        b.iter(|| parse_whois(Rir::Lacnic, black_box(LACNIC), None))
    });
}

fn benchmark_asn_parsing(c: &mut Criterion) {
    let line = "15169   | 74.125.225.229   | 74.125.225.0/24     | US | arin     | 2007-03-13 | GOOGLE, US";
    c.bench_function("parse_fields_whois", |b| {
        b.iter(|| parse_fields_whois(black_box(line)))
    });
}

fn benchmark_rdap_parsing(c: &mut Criterion) {
    let value: serde_json::Value =
        serde_json::from_str(RDAP_NETWORK).expect("fixture is valid JSON");
    c.bench_function("rdap_network_from_json", |b| {
        b.iter(|| RdapNetwork::from_json(black_box(&value)))
    });
}

fn benchmark_utils(c: &mut Criterion) {
    c.bench_function("calculate_cidr", |b| {
        b.iter(|| calculate_cidr(black_box("192.168.0.9"), black_box("192.168.5.4")))
    });

    let text = ARIN.repeat(20);
    c.bench_function("unique_addresses", |b| {
        b.iter(|| unique_addresses(black_box(&text)))
    });
}

criterion_group!(
    benches,
    benchmark_whois_parsing,
    benchmark_asn_parsing,
    benchmark_rdap_parsing,
    benchmark_utils
);
criterion_main!(benches);
