//! RDAP JSON object parsing (RFC 9083): networks, entities and jCard contacts

use crate::error::{IpWhoisError, Result};
use crate::utils::summarize_range;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use tracing::debug;

/// An RDAP event (`registration`, `last changed`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapEvent {
    /// Event action
    pub action: String,
    /// Event timestamp as published
    pub timestamp: String,
    /// Entity that caused the event
    pub actor: Option<String>,
}

/// An RDAP notice or remark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapNotice {
    /// Title
    pub title: Option<String>,
    /// Description lines joined by newlines
    pub description: Option<String>,
    /// Link targets
    pub links: Vec<String>,
}

/// A typed jCard value such as a phone number or e-mail address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapContactValue {
    /// jCard `type` parameters (`work`, `voice`, ...)
    pub types: Vec<String>,
    /// The value
    pub value: String,
}

/// Contact details from an entity's `vcardArray`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapContact {
    /// Formatted name (`fn`)
    pub name: Option<String>,
    /// `individual`, `org`, ...
    pub kind: Option<String>,
    /// Postal addresses
    pub address: Vec<RdapContactValue>,
    /// Phone numbers
    pub phone: Vec<RdapContactValue>,
    /// E-mail addresses
    pub email: Vec<RdapContactValue>,
    /// Role
    pub role: Option<String>,
    /// Title
    pub title: Option<String>,
}

/// An RDAP IP network object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapNetwork {
    /// Registry handle
    pub handle: String,
    /// Status values
    pub status: Vec<String>,
    /// Events
    pub events: Vec<RdapEvent>,
    /// Link targets
    pub links: Vec<String>,
    /// Notices
    pub notices: Vec<RdapNotice>,
    /// Remarks
    pub remarks: Vec<RdapNotice>,
    /// First address of the network
    pub start_address: String,
    /// Last address of the network
    pub end_address: String,
    /// One or more CIDRs joined by `", "`
    pub cidr: String,
    /// `v4` or `v6`
    pub ip_version: Option<String>,
    /// Allocation type
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Network name
    pub name: Option<String>,
    /// Country code
    pub country: Option<String>,
    /// Handle of the parent network
    pub parent_handle: Option<String>,
}

/// An RDAP entity object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdapEntity {
    /// Registry handle
    pub handle: String,
    /// Roles relative to the referencing object
    pub roles: Vec<String>,
    /// Status values
    pub status: Vec<String>,
    /// Parsed jCard, when present and well formed
    pub contact: Option<RdapContact>,
    /// Events
    pub events: Vec<RdapEvent>,
    /// Link targets
    pub links: Vec<String>,
    /// Notices
    pub notices: Vec<RdapNotice>,
    /// Remarks
    pub remarks: Vec<RdapNotice>,
    /// Handles of nested entities
    pub entities: Vec<String>,
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn strings_at(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn objects_at<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn parse_links(value: &Value) -> Vec<String> {
    objects_at(value, "links")
        .filter_map(|link| string_at(link, "href"))
        .collect()
}

fn parse_events(value: &Value) -> Vec<RdapEvent> {
    objects_at(value, "events")
        .filter_map(|event| {
            Some(RdapEvent {
                action: string_at(event, "eventAction")?,
                timestamp: string_at(event, "eventDate")?,
                actor: string_at(event, "eventActor"),
            })
        })
        .collect()
}

fn parse_notices(value: &Value, key: &str) -> Vec<RdapNotice> {
    objects_at(value, key)
        .map(|notice| {
            let description = strings_at(notice, "description");
            RdapNotice {
                title: string_at(notice, "title"),
                description: (!description.is_empty()).then(|| description.join("\n")),
                links: parse_links(notice),
            }
        })
        .collect()
}

fn parse_cidr0(value: &Value) -> Vec<String> {
    objects_at(value, "cidr0_cidrs")
        .filter_map(|entry| {
            let prefix = string_at(entry, "v4prefix").or_else(|| string_at(entry, "v6prefix"))?;
            let length = entry.get("length")?.as_u64()?;
            Some(format!("{prefix}/{length}"))
        })
        .collect()
}

impl RdapNetwork {
    /// Parses an RDAP `ip network` object.
    ///
    /// # Errors
    ///
    /// [`IpWhoisError::InvalidNetworkObject`] when the handle or either
    /// boundary address is missing.
    pub fn from_json(value: &Value) -> Result<Self> {
        let invalid = |what: &str| IpWhoisError::InvalidNetworkObject(format!("missing {what}"));
        if !value.is_object() {
            return Err(IpWhoisError::InvalidNetworkObject("not a JSON object".to_string()));
        }
        let handle = string_at(value, "handle").ok_or_else(|| invalid("handle"))?;
        let start_address = string_at(value, "startAddress").ok_or_else(|| invalid("startAddress"))?;
        let end_address = string_at(value, "endAddress").ok_or_else(|| invalid("endAddress"))?;

        let mut cidrs = parse_cidr0(value);
        if cidrs.is_empty() {
            let bounds = (
                start_address.parse::<IpAddr>(),
                end_address.parse::<IpAddr>(),
            );
            if let (Ok(first), Ok(last)) = bounds {
                cidrs = IpNet::aggregate(&summarize_range(first, last))
                    .iter()
                    .map(IpNet::to_string)
                    .collect();
            }
        }
        if cidrs.is_empty() {
            return Err(IpWhoisError::InvalidNetworkObject(format!(
                "no CIDR for {start_address} - {end_address}"
            )));
        }

        Ok(Self {
            handle,
            status: strings_at(value, "status"),
            events: parse_events(value),
            links: parse_links(value),
            notices: parse_notices(value, "notices"),
            remarks: parse_notices(value, "remarks"),
            start_address,
            end_address,
            cidr: cidrs.join(", "),
            ip_version: string_at(value, "ipVersion"),
            kind: string_at(value, "type"),
            name: string_at(value, "name"),
            country: string_at(value, "country"),
            parent_handle: string_at(value, "parentHandle"),
        })
    }
}

impl RdapEntity {
    /// Parses an RDAP entity object.
    ///
    /// A malformed `vcardArray` leaves `contact` empty instead of failing.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(IpWhoisError::InvalidEntityObject("not a JSON object".to_string()));
        }
        let handle = string_at(value, "handle")
            .ok_or_else(|| IpWhoisError::InvalidEntityObject("missing handle".to_string()))?;

        let contact = match value.get("vcardArray") {
            Some(vcard) => match RdapContact::from_vcard(vcard) {
                Ok(contact) => Some(contact),
                Err(e) => {
                    debug!("Skipping contact for entity {handle}: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            roles: strings_at(value, "roles"),
            status: strings_at(value, "status"),
            contact,
            events: parse_events(value),
            links: parse_links(value),
            notices: parse_notices(value, "notices"),
            remarks: parse_notices(value, "remarks"),
            entities: objects_at(value, "entities")
                .filter_map(|e| string_at(e, "handle"))
                .collect(),
            handle,
        })
    }
}

fn vcard_types(params: &Value) -> Vec<String> {
    match params.get("type") {
        Some(Value::String(kind)) => vec![kind.clone()],
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn vcard_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let lines: Vec<String> = parts
                .iter()
                .filter_map(vcard_text)
                .filter(|s| !s.trim().is_empty())
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        _ => None,
    }
}

impl RdapContact {
    /// Parses a jCard (`["vcard", [[name, params, type, value], ...]]`).
    ///
    /// # Errors
    ///
    /// [`IpWhoisError::InvalidEntityContactObject`] when the structure is not
    /// a jCard.
    pub fn from_vcard(vcard: &Value) -> Result<Self> {
        let invalid = |why: &str| IpWhoisError::InvalidEntityContactObject(why.to_string());
        let parts = vcard.as_array().ok_or_else(|| invalid("vcardArray is not an array"))?;
        if parts.first().and_then(Value::as_str) != Some("vcard") {
            return Err(invalid("vcardArray does not start with \"vcard\""));
        }
        let properties = parts
            .get(1)
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("vcardArray has no property list"))?;

        let mut contact = RdapContact::default();
        for property in properties {
            let Some(fields) = property.as_array() else {
                continue;
            };
            let (Some(name), Some(params), Some(value)) = (
                fields.first().and_then(Value::as_str),
                fields.get(1),
                fields.get(3),
            ) else {
                continue;
            };

            match name {
                "fn" => contact.name = vcard_text(value),
                "kind" => contact.kind = vcard_text(value),
                "role" => contact.role = vcard_text(value),
                "title" => contact.title = vcard_text(value),
                "adr" => {
                    let label = params.get("label").and_then(Value::as_str).map(str::to_string);
                    if let Some(text) = label.or_else(|| vcard_text(value)) {
                        contact.address.push(RdapContactValue {
                            types: vcard_types(params),
                            value: text,
                        });
                    }
                }
                "tel" | "email" => {
                    if let Some(text) = vcard_text(value) {
                        let entry = RdapContactValue {
                            types: vcard_types(params),
                            value: text.trim().to_string(),
                        };
                        if name == "tel" {
                            contact.phone.push(entry);
                        } else {
                            contact.email.push(entry);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(contact)
    }
}
