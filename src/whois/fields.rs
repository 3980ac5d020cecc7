//! Line-oriented field extraction shared by the WHOIS, NIR and ASN origin
//! parsers, plus the per-registry WHOIS field tables

use crate::asn::Rir;
use crate::utils::unique_everseen;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// How consecutive matches of one field are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Span {
    /// One value per line; further values only from directly following lines
    Line,
    /// Like `Line`, and indented continuation lines extend the value
    Continued,
    /// Every match in the section counts, adjacent or not
    Scattered,
}

/// A compiled field pattern; the value is the `val` capture group
#[derive(Debug)]
pub(crate) struct FieldPattern {
    regex: Regex,
    span: Span,
}

impl FieldPattern {
    pub(crate) fn new(pattern: &str, span: Span) -> Self {
        Self {
            regex: Regex::new(pattern).expect("static field regex"),
            span,
        }
    }

    pub(crate) fn line(pattern: &str) -> Self {
        Self::new(pattern, Span::Line)
    }

    pub(crate) fn continued(pattern: &str) -> Self {
        Self::new(pattern, Span::Continued)
    }

    pub(crate) fn scattered(pattern: &str) -> Self {
        Self::new(pattern, Span::Scattered)
    }

    /// Collects the field's values from `text`.
    ///
    /// For `Line`/`Continued` fields collection stops at the first match
    /// that does not begin on the line right after the previous one.
    pub(crate) fn extract(&self, text: &str) -> Vec<String> {
        let mut values = Vec::new();
        let mut prev_end: Option<usize> = None;

        for caps in self.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if self.span != Span::Scattered {
                if let Some(end) = prev_end {
                    if whole.start() != end + 1 {
                        break;
                    }
                }
            }
            let mut end = whole.end();
            let Some(val) = caps.name("val") else {
                prev_end = Some(end);
                continue;
            };

            let mut value = val.as_str().trim().to_string();
            if self.span == Span::Continued {
                while let Some(rest) = text.get(end..).and_then(|r| r.strip_prefix('\n')) {
                    let line = rest.split('\n').next().unwrap_or_default();
                    let indented = line.starts_with([' ', '\t']);
                    if !indented || line.trim().is_empty() {
                        break;
                    }
                    value.push('\n');
                    value.push_str(line.trim());
                    end += 1 + line.len();
                }
            }

            values.push(value);
            prev_end = Some(end);
        }
        values
    }
}

/// Parses a registry timestamp into ISO-8601 (`YYYY-MM-DDTHH:MM:SS`).
///
/// Date-only formats get midnight. `hour_offset` is subtracted, which turns
/// local registry time into UTC.
pub(crate) fn parse_timestamp(value: &str, format: &str, hour_offset: i64) -> Option<String> {
    let value = value.trim();
    let parsed = NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    let shifted = parsed - TimeDelta::hours(hour_offset);
    Some(shifted.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Unique values joined by newlines, in first-seen order
pub(crate) fn join_unique(values: Vec<String>) -> String {
    unique_everseen(values).join("\n")
}

/// A field parsed from a WHOIS network block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhoisField {
    /// Network in CIDR notation (RWhois only)
    Cidr,
    /// Network name
    Name,
    /// Network handle
    Handle,
    /// Owner description
    Description,
    /// Country code
    Country,
    /// State or province
    State,
    /// City
    City,
    /// Street address
    Address,
    /// Postal code
    PostalCode,
    /// Contact e-mail addresses
    Emails,
    /// Registration timestamp
    Created,
    /// Last-modified timestamp
    Updated,
}

impl WhoisField {
    /// Fields selectable through a field list
    pub const ALL: [WhoisField; 11] = [
        WhoisField::Name,
        WhoisField::Handle,
        WhoisField::Description,
        WhoisField::Country,
        WhoisField::State,
        WhoisField::City,
        WhoisField::Address,
        WhoisField::PostalCode,
        WhoisField::Emails,
        WhoisField::Created,
        WhoisField::Updated,
    ];

    /// snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            WhoisField::Cidr => "cidr",
            WhoisField::Name => "name",
            WhoisField::Handle => "handle",
            WhoisField::Description => "description",
            WhoisField::Country => "country",
            WhoisField::State => "state",
            WhoisField::City => "city",
            WhoisField::Address => "address",
            WhoisField::PostalCode => "postal_code",
            WhoisField::Emails => "emails",
            WhoisField::Created => "created",
            WhoisField::Updated => "updated",
        }
    }
}

impl fmt::Display for WhoisField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhoisField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        std::iter::once(WhoisField::Cidr)
            .chain(WhoisField::ALL)
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown WHOIS field: {s}"))
    }
}

pub(crate) type FieldTable = Vec<(WhoisField, FieldPattern)>;

const EMAIL: &str =
    r"(?m)^[^\n]*?:[^\n]*?[^\S\n](?P<val>[\w\-.]+@[\w\-.]+\.[\w\-]+)";

fn line(key: &str) -> FieldPattern {
    FieldPattern::line(&format!(r"(?m)^(?:{key}):[^\S\n]+(?P<val>.+?)[^\S\n]*$"))
}

fn continued(key: &str) -> FieldPattern {
    FieldPattern::continued(&format!(r"(?m)^(?:{key}):[^\S\n]+(?P<val>.+?)[^\S\n]*$"))
}

fn rwhois(key: &str) -> FieldPattern {
    FieldPattern::line(&format!(r"(?m)^network:(?:{key}):(?P<val>.+?)[^\S\n]*$"))
}

static ARIN_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Name, line("NetName")),
        (WhoisField::Handle, line("NetHandle")),
        (WhoisField::Description, continued("OrgName|CustName")),
        (WhoisField::Country, line("Country")),
        (WhoisField::State, line("StateProv")),
        (WhoisField::City, line("City")),
        (WhoisField::Address, continued("Address")),
        (WhoisField::PostalCode, line("PostalCode")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
        (WhoisField::Created, line("RegDate")),
        (WhoisField::Updated, line("Updated")),
    ]
});

static RIPENCC_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Name, line("netname")),
        (WhoisField::Handle, line("nic-hdl")),
        (WhoisField::Description, continued("descr")),
        (WhoisField::Country, line("country")),
        (WhoisField::Address, continued("address")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
        (
            WhoisField::Created,
            FieldPattern::line(
                r"(?m)^created:[^\S\n]+(?P<val>[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}Z).*$",
            ),
        ),
        (
            WhoisField::Updated,
            FieldPattern::line(
                r"(?m)^last-modified:[^\S\n]+(?P<val>[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}Z).*$",
            ),
        ),
    ]
});

static APNIC_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Name, line("netname")),
        (WhoisField::Handle, line("nic-hdl")),
        (WhoisField::Description, continued("descr")),
        (WhoisField::Country, line("country")),
        (WhoisField::Address, continued("address")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
        (
            WhoisField::Updated,
            FieldPattern::line(r"(?m)^changed:[^\S\n]+.*(?P<val>[0-9]{8}).*$"),
        ),
    ]
});

static LACNIC_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Handle, line("nic-hdl")),
        (WhoisField::Description, continued("owner")),
        (WhoisField::Country, line("country")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
        (
            WhoisField::Created,
            FieldPattern::line(r"(?m)^created:[^\S\n]+(?P<val>[0-9]{8}).*$"),
        ),
        (
            WhoisField::Updated,
            FieldPattern::line(r"(?m)^changed:[^\S\n]+(?P<val>[0-9]{8}).*$"),
        ),
    ]
});

static AFRINIC_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Name, line("netname")),
        (WhoisField::Handle, line("nic-hdl")),
        (WhoisField::Description, continued("descr")),
        (WhoisField::Country, line("country")),
        (WhoisField::Address, continued("address")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
    ]
});

static RWHOIS_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    vec![
        (WhoisField::Cidr, rwhois("IP-Network")),
        (WhoisField::Name, rwhois("ID")),
        (
            WhoisField::Description,
            rwhois("Org-Name|Organization(?:;I)?"),
        ),
        (WhoisField::Country, rwhois("Country|Country-Code")),
        (WhoisField::State, rwhois("State")),
        (WhoisField::City, rwhois("City")),
        (WhoisField::Address, rwhois("Street-Address")),
        (WhoisField::PostalCode, rwhois("Postal-Code")),
        (WhoisField::Emails, FieldPattern::scattered(EMAIL)),
        (WhoisField::Created, rwhois("Created")),
        (WhoisField::Updated, rwhois("Updated")),
    ]
});

/// Field table for a registry's WHOIS output
pub(crate) fn registry_fields(rir: Rir) -> &'static FieldTable {
    match rir {
        Rir::Arin => &ARIN_FIELDS,
        Rir::Ripencc => &RIPENCC_FIELDS,
        Rir::Apnic => &APNIC_FIELDS,
        Rir::Lacnic => &LACNIC_FIELDS,
        Rir::Afrinic => &AFRINIC_FIELDS,
    }
}

/// Field table for RWhois referral output
pub(crate) fn rwhois_fields() -> &'static FieldTable {
    &RWHOIS_FIELDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_values_stop_at_gap() {
        let pattern = line("descr");
        let text = "descr: First\ndescr: Second\nsource: RIPE\ndescr: Elsewhere\n";
        assert_eq!(pattern.extract(text), vec!["First", "Second"]);
    }

    #[test]
    fn test_continued_value_absorbs_indented_lines() {
        let pattern = continued("Address");
        let text = "Address:        1600 Amphitheatre Parkway\n                Building 4\nCity: Mountain View\n";
        assert_eq!(
            pattern.extract(text),
            vec!["1600 Amphitheatre Parkway\nBuilding 4"]
        );
    }

    #[test]
    fn test_continued_then_adjacent_key() {
        let pattern = continued("descr");
        let text = "descr: One\n  more\ndescr: Two\ncountry: NL\n";
        assert_eq!(pattern.extract(text), vec!["One\nmore", "Two"]);
    }

    #[test]
    fn test_emails_scattered() {
        let pattern = FieldPattern::scattered(EMAIL);
        let text = "OrgAbuseEmail:  abuse@example.net\nOrgTechName: Ops\nOrgTechEmail: ops@example.net\n";
        assert_eq!(
            pattern.extract(text),
            vec!["abuse@example.net", "ops@example.net"]
        );
    }

    #[test]
    fn test_apnic_changed_takes_date() {
        let text = "changed:        hm-changed@apnic.net 20110922\n";
        let fields = registry_fields(Rir::Apnic);
        let (_, pattern) = fields
            .iter()
            .find(|(f, _)| *f == WhoisField::Updated)
            .unwrap();
        assert_eq!(pattern.extract(text), vec!["20110922"]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2007-03-13", "%Y-%m-%d", 0).as_deref(),
            Some("2007-03-13T00:00:00")
        );
        assert_eq!(
            parse_timestamp("2012-02-24T10:11:12Z", "%Y-%m-%dT%H:%M:%SZ", 0).as_deref(),
            Some("2012-02-24T10:11:12")
        );
        assert_eq!(
            parse_timestamp("2014/01/01 09:30:00(JST)", "%Y/%m/%d %H:%M:%S(JST)", 9).as_deref(),
            Some("2014-01-01T00:30:00")
        );
        assert!(parse_timestamp("13/03/2007", "%Y-%m-%d", 0).is_none());
    }

    #[test]
    fn test_field_names() {
        assert_eq!("postal_code".parse::<WhoisField>().unwrap(), WhoisField::PostalCode);
        assert!("nope".parse::<WhoisField>().is_err());
        assert_eq!(WhoisField::Emails.to_string(), "emails");
    }

    #[test]
    fn test_join_unique() {
        let values = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(join_unique(values), "a\nb");
    }
}
