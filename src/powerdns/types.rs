use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsZone {
    pub id: String,   // "example.com."
    pub name: String, // "example.com."
    #[serde(default)]
    pub rrsets: Option<Vec<PdnsRrset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsRrset {
    pub name: String, // "www.example.com."
    #[serde(rename = "type")]
    pub rrtype: String, // "A", "NS", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changetype: Option<String>, // "REPLACE" / "DELETE" when patching
    #[serde(default)]
    pub records: Vec<PdnsRecord>,
}

impl PdnsRrset {
    /// PATCH entry removing every record of this name and type.
    pub fn deletion(name: impl Into<String>, rrtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rrtype: rrtype.into(),
            ttl: None,
            changetype: Some("DELETE".into()),
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsRecord {
    pub content: String, // "192.0.2.1" or "ns1.example.net."
    #[serde(default)]
    pub disabled: bool,
}

// Used when creating a zone
#[derive(Debug, Serialize, Deserialize)]
pub struct PdnsZoneCreate {
    pub name: String,             // "shop.example.com."
    pub kind: String,             // "Native"
    pub nameservers: Vec<String>, // ["ns1.example.net.", "ns2.example.net."]
}
