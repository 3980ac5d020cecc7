//! National Internet Registry lookups (JPNIC, KRNIC)
//!
//! Both registries only publish HTML over HTTP, so lookups go through
//! [`Net::get_http_raw`] and are parsed with line-anchored patterns.

mod parse;

use crate::config::LookupOptions;
use crate::error::Result;
use crate::net::{HttpRequest, Net};
use parse::{
    extract_values, get_nets_jpnic, get_nets_krnic, parse_contact, parse_nir_date, ContactRef,
    NirBlock,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const JPNIC_URL: &str = "http://whois.nic.ad.jp/cgi-bin/whois_gw?lang=%2Fe&key={0}&submit=query";
const KRNIC_URL: &str = "http://whois.kisa.or.kr/eng/whois.jsc";

/// A National Internet Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nir {
    /// Japan Network Information Center
    Jpnic,
    /// Korea Network Information Center
    Krnic,
}

impl Nir {
    /// The NIR serving a country, by ISO-3166 code
    pub fn for_country(code: &str) -> Option<Nir> {
        match code.trim().to_uppercase().as_str() {
            "JP" => Some(Nir::Jpnic),
            "KR" => Some(Nir::Krnic),
            _ => None,
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Nir::Jpnic => "jpnic",
            Nir::Krnic => "krnic",
        }
    }

    /// Country code of every network this NIR returns
    pub fn country_code(self) -> &'static str {
        match self {
            Nir::Jpnic => "JP",
            Nir::Krnic => "KR",
        }
    }

    fn date_formats(self) -> &'static [&'static str] {
        match self {
            Nir::Jpnic => &["%Y/%m/%d %H:%M:%S(JST)", "%Y/%m/%d"],
            Nir::Krnic => &["%Y%m%d"],
        }
    }

    fn hour_offset(self) -> i64 {
        match self {
            Nir::Jpnic => 9,
            Nir::Krnic => 0,
        }
    }

    /// Request for the network (or JPNIC contact handle) `key`
    fn request(self, key: &str) -> HttpRequest {
        let request = match self {
            Nir::Jpnic => HttpRequest::get(JPNIC_URL.replace("{0}", key)),
            Nir::Krnic => HttpRequest::post_form(
                KRNIC_URL,
                vec![("query".to_string(), key.to_string())],
            ),
        };
        request.header("Accept", "text/html")
    }
}

impl fmt::Display for Nir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Nir {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpnic" => Ok(Nir::Jpnic),
            "krnic" => Ok(Nir::Krnic),
            other => Err(format!("Invalid argument for nir (National Internet Registry): {other}")),
        }
    }
}

/// A field parsed from an NIR network block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NirField {
    /// Organization name
    Name,
    /// Network name or service name
    Handle,
    /// Street address
    Address,
    /// Postal code
    PostalCode,
    /// Name servers
    Nameservers,
    /// Assignment date
    Created,
    /// Last update
    Updated,
    /// Administrative contact
    ContactAdmin,
    /// Technical contact
    ContactTech,
}

impl NirField {
    /// Every field
    pub const ALL: [NirField; 9] = [
        NirField::Name,
        NirField::Handle,
        NirField::Address,
        NirField::PostalCode,
        NirField::Nameservers,
        NirField::Created,
        NirField::Updated,
        NirField::ContactAdmin,
        NirField::ContactTech,
    ];

    /// snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            NirField::Name => "name",
            NirField::Handle => "handle",
            NirField::Address => "address",
            NirField::PostalCode => "postal_code",
            NirField::Nameservers => "nameservers",
            NirField::Created => "created",
            NirField::Updated => "updated",
            NirField::ContactAdmin => "contact_admin",
            NirField::ContactTech => "contact_tech",
        }
    }
}

impl fmt::Display for NirField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NirField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        NirField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown NIR field: {s}"))
    }
}

/// An NIR point of contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NirContact {
    /// Contact name
    pub name: Option<String>,
    /// E-mail address
    pub email: Option<String>,
    /// Organization
    pub organization: Option<String>,
    /// Division within the organization
    pub division: Option<String>,
    /// Job title
    pub title: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Fax number
    pub fax: Option<String>,
    /// Last update timestamp (UTC)
    pub updated: Option<String>,
}

/// Contacts attached to an NIR network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NirContacts {
    /// Administrative contact
    pub admin: Option<NirContact>,
    /// Technical contact
    pub tech: Option<NirContact>,
}

/// One network block from an NIR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NirNet {
    /// One or more CIDRs joined by `", "`
    pub cidr: String,
    /// Address range covered
    pub range: String,
    /// Organization name
    pub name: Option<String>,
    /// Network or service name
    pub handle: Option<String>,
    /// Country code of the NIR
    pub country: String,
    /// Street address
    pub address: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Name servers
    pub nameservers: Option<Vec<String>>,
    /// Assignment timestamp (UTC)
    pub created: Option<String>,
    /// Last update timestamp (UTC)
    pub updated: Option<String>,
    /// Administrative and technical contacts
    pub contacts: NirContacts,
}

/// NIR lookup output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NirResults {
    /// The queried address
    pub query: String,
    /// Registry that answered
    pub nir: Nir,
    /// Network blocks in response order
    pub nets: Vec<NirNet>,
    /// Raw response, when requested
    pub raw: Option<String>,
}

struct ParsedNet {
    net: NirNet,
    admin: Option<ContactRef>,
    tech: Option<ContactRef>,
}

fn wanted(field_list: Option<&[NirField]>, field: NirField) -> bool {
    field_list.map_or(true, |list| list.contains(&field))
}

fn parse_blocks(nir: Nir, response: &str, field_list: Option<&[NirField]>) -> Vec<ParsedNet> {
    let blocks: Vec<NirBlock> = match nir {
        Nir::Jpnic => get_nets_jpnic(response),
        Nir::Krnic => get_nets_krnic(response),
    };

    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            let section_end = blocks
                .get(index + 1)
                .map_or(response.len(), |next| next.start);
            let section = response.get(block.end..section_end).unwrap_or_default();

            let mut net = NirNet {
                cidr: block.cidr.clone(),
                range: block.range.clone(),
                name: None,
                handle: None,
                country: nir.country_code().to_string(),
                address: None,
                postal_code: None,
                nameservers: None,
                created: None,
                updated: None,
                contacts: NirContacts::default(),
            };

            for (field, pattern) in nir.fields() {
                if !wanted(field_list, *field) {
                    continue;
                }
                let values = extract_values(pattern, section);
                let Some(first) = values.first() else {
                    continue;
                };
                match field {
                    NirField::Created => net.created = parse_nir_date(nir, first),
                    NirField::Updated => net.updated = parse_nir_date(nir, first),
                    NirField::Nameservers => net.nameservers = Some(values),
                    NirField::Name => net.name = Some(values.join("\n")),
                    NirField::Handle => net.handle = Some(values.join("\n")),
                    NirField::Address => net.address = Some(values.join("\n")),
                    NirField::PostalCode => net.postal_code = Some(values.join("\n")),
                    NirField::ContactAdmin | NirField::ContactTech => {}
                }
            }

            let (admin, tech) = nir.contact_refs(section);
            ParsedNet {
                net,
                admin: admin.filter(|_| wanted(field_list, NirField::ContactAdmin)),
                tech: tech.filter(|_| wanted(field_list, NirField::ContactTech)),
            }
        })
        .collect()
}

/// Parses an NIR response without network I/O.
///
/// Inline KRNIC contacts are parsed; JPNIC contact handles need a
/// second query and are left empty.
pub fn parse_nir(nir: Nir, response: &str, field_list: Option<&[NirField]>) -> Vec<NirNet> {
    parse_blocks(nir, response, field_list)
        .into_iter()
        .map(|parsed| {
            let mut net = parsed.net;
            let inline = |r: Option<ContactRef>| match r {
                Some(ContactRef::Inline(text)) => Some(parse_contact(nir, &text)),
                _ => None,
            };
            net.contacts.admin = inline(parsed.admin);
            net.contacts.tech = inline(parsed.tech);
            net
        })
        .collect()
}

/// NIR lookups for one address
#[derive(Debug, Clone, Copy)]
pub struct NirWhois<'a> {
    net: &'a Net,
}

impl<'a> NirWhois<'a> {
    /// Creates an NIR client over `net`
    pub fn new(net: &'a Net) -> Self {
        Self { net }
    }

    /// Queries `nir` (unless `response` is given) and parses every network,
    /// fetching JPNIC contacts by handle.
    pub async fn lookup(
        &self,
        nir: Nir,
        options: &LookupOptions,
        response: Option<String>,
    ) -> Result<NirResults> {
        let response = match response {
            Some(response) => response,
            None => {
                debug!("Response not given, perform NIR lookup for {}", self.net.address_str());
                self.net
                    .get_http_raw(nir.request(self.net.address_str()), options.retry_count)
                    .await?
            }
        };

        debug!("Parsing NIR WHOIS data");
        let field_list = options.nir_field_list.as_deref();
        let mut contact_cache: HashMap<String, NirContact> = HashMap::new();
        let mut nets = Vec::new();

        for parsed in parse_blocks(nir, &response, field_list) {
            let mut net = parsed.net;
            net.contacts.admin = self
                .resolve_contact(nir, parsed.admin, options.retry_count, &mut contact_cache)
                .await?;
            net.contacts.tech = self
                .resolve_contact(nir, parsed.tech, options.retry_count, &mut contact_cache)
                .await?;
            nets.push(net);
        }

        Ok(NirResults {
            query: self.net.address_str().to_string(),
            nir,
            nets,
            raw: options.inc_raw.then_some(response),
        })
    }

    async fn resolve_contact(
        &self,
        nir: Nir,
        contact: Option<ContactRef>,
        retry_count: u32,
        cache: &mut HashMap<String, NirContact>,
    ) -> Result<Option<NirContact>> {
        match contact {
            None => Ok(None),
            Some(ContactRef::Inline(text)) => Ok(Some(parse_contact(nir, &text))),
            Some(ContactRef::Handle(handle)) => {
                if let Some(cached) = cache.get(&handle) {
                    return Ok(Some(cached.clone()));
                }
                debug!("Fetching {nir} contact {handle}");
                let text = self.net.get_http_raw(nir.request(&handle), retry_count).await?;
                let parsed = parse_contact(nir, &text);
                cache.insert(handle, parsed.clone());
                Ok(Some(parsed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::test_support::*;
    use crate::net::HttpMethod;
    use std::sync::Arc;

    const JPNIC_RESPONSE: &str = "\
<PRE>
Network Information:
a. [Network Number]             <A HREF=\"/cgi-bin/whois_gw?lang=%2Fe&key=133.1.0.0/16\">133.1.0.0/16</A>
b. [Network Name]               OSAKAU-NET
g. [Organization]               Osaka University
m. [Administrative Contact]     <A HREF=\"/cgi-bin/whois_gw?lang=%2Fe&key=JP00000001\">JP00000001</A>
n. [Technical Contact]          <A HREF=\"/cgi-bin/whois_gw?lang=%2Fe&key=JP00000001\">JP00000001</A>
p. [Nameserver]                 ns1.osaka-u.ac.jp
p. [Nameserver]                 ns2.osaka-u.ac.jp
[Assigned Date]                 1988/04/01
[Last Update]                   2008/07/24 17:40:13(JST)
</PRE>
";

    const JPNIC_CONTACT: &str = "\
a. [JPNIC Handle]               JP00000001
c. [Last, First]                Yamada, Taro
d. [E-Mail]                     hostmaster@osaka-u.ac.jp
g. [Organization]               Osaka University
l. [Division]                   Cybermedia Center
o. [TEL]                        06-1234-5678
p. [FAX]                        06-1234-5679
[Last Update]                   2015/04/01 10:00:00(JST)
";

    const KRNIC_RESPONSE: &str = "\
IPv4 Address       : 115.0.0.0 - 115.23.255.255 (/12+/13)
Organization Name  : Korea Telecom
Service Name       : KORNET
Address            : Gyeonggi-do Bundang-gu Seongnam-si Buljeong-ro 90
Zip Code           : 13606
Registration Date  : 20060802
<div id=\"eng_isp_contact\">
Name               : IP Manager
Phone              : +82-2-500-6630
E-Mail             : kornet_ip@kt.com
</div>
";

    #[test]
    fn test_parse_krnic_offline() {
        let nets = parse_nir(Nir::Krnic, KRNIC_RESPONSE, None);
        assert_eq!(nets.len(), 1);
        let net = &nets[0];
        assert_eq!(net.cidr, "115.0.0.0/12, 115.16.0.0/13");
        assert_eq!(net.name.as_deref(), Some("Korea Telecom"));
        assert_eq!(net.handle.as_deref(), Some("KORNET"));
        assert_eq!(net.postal_code.as_deref(), Some("13606"));
        assert_eq!(net.created.as_deref(), Some("2006-08-02T00:00:00"));
        assert_eq!(net.country, "KR");
        let admin = net.contacts.admin.as_ref().unwrap();
        assert_eq!(admin.email.as_deref(), Some("kornet_ip@kt.com"));
        assert!(net.contacts.tech.is_none());
    }

    #[test]
    fn test_field_list_skips_contacts() {
        let list = [NirField::Name];
        let nets = parse_nir(Nir::Krnic, KRNIC_RESPONSE, Some(&list));
        assert_eq!(nets[0].name.as_deref(), Some("Korea Telecom"));
        assert!(nets[0].handle.is_none());
        assert!(nets[0].contacts.admin.is_none());
    }

    #[test]
    fn test_nir_for_country() {
        assert_eq!(Nir::for_country("jp"), Some(Nir::Jpnic));
        assert_eq!(Nir::for_country("KR"), Some(Nir::Krnic));
        assert_eq!(Nir::for_country("US"), None);
        assert!("apnic".parse::<Nir>().is_err());
        assert_eq!("contact_tech".parse::<NirField>().unwrap(), NirField::ContactTech);
    }

    #[tokio::test]
    async fn test_jpnic_lookup_fetches_contact_once() {
        let http = ScriptedHttp::new(vec![
            ScriptedHttp::ok(200, JPNIC_RESPONSE),
            ScriptedHttp::ok(200, JPNIC_CONTACT),
        ]);
        let net = net_with(
            "133.1.2.5",
            ScriptedWhois::new(vec![]),
            http.clone(),
            Arc::new(TableDns::default()),
        );

        let results = NirWhois::new(&net)
            .lookup(Nir::Jpnic, &LookupOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(results.nir, Nir::Jpnic);
        assert!(results.raw.is_none());

        let jp = &results.nets[0];
        assert_eq!(jp.cidr, "133.1.0.0/16");
        assert_eq!(jp.range, "133.1.0.1 - 133.1.255.255");
        assert_eq!(jp.handle.as_deref(), Some("OSAKAU-NET"));
        assert_eq!(jp.name.as_deref(), Some("Osaka University"));
        assert_eq!(
            jp.nameservers,
            Some(vec!["ns1.osaka-u.ac.jp".to_string(), "ns2.osaka-u.ac.jp".to_string()])
        );
        assert_eq!(jp.created.as_deref(), Some("1988-03-31T15:00:00"));
        assert_eq!(jp.updated.as_deref(), Some("2008-07-24T08:40:13"));

        let admin = jp.contacts.admin.as_ref().unwrap();
        assert_eq!(admin.name.as_deref(), Some("Yamada, Taro"));
        assert_eq!(admin.division.as_deref(), Some("Cybermedia Center"));
        assert_eq!(admin.phone.as_deref(), Some("06-1234-5678"));
        assert_eq!(admin.updated.as_deref(), Some("2015-04-01T01:00:00"));
        assert_eq!(jp.contacts.tech.as_ref(), Some(admin));

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.contains("key=133.1.2.5"));
        assert!(requests[1].url.contains("key=JP00000001"));
    }

    #[tokio::test]
    async fn test_krnic_lookup_posts_form() {
        let http = ScriptedHttp::new(vec![ScriptedHttp::ok(200, KRNIC_RESPONSE)]);
        let net = net_with(
            "115.1.2.3",
            ScriptedWhois::new(vec![]),
            http.clone(),
            Arc::new(TableDns::default()),
        );
        let options = LookupOptions::builder().inc_raw(true).build().unwrap();
        let results = NirWhois::new(&net)
            .lookup(Nir::Krnic, &options, None)
            .await
            .unwrap();
        assert_eq!(results.nets.len(), 1);
        assert!(results.raw.is_some());

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(
            requests[0].form,
            vec![("query".to_string(), "115.1.2.3".to_string())]
        );
    }
}
