//! `ifconfig` output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Parsed;

static INET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"inet (?:addr:)?(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")
        .expect("inet regex should compile")
});
static NETMASK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:netmask |Mask:)([\da-fx.]+)")
        .expect("netmask regex should compile")
});
static ETHER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ether |HWaddr )([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5})")
        .expect("ether regex should compile")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: Option<String>,
    pub netmask: Option<String>,
    pub mac: Option<String>,
    /// `up` once an IPv4 address is bound, otherwise `down`.
    pub status: String,
}

impl NetworkInterface {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ip: None,
            netmask: None,
            mac: None,
            status: "down".to_string(),
        }
    }
}

pub fn parse_interfaces(raw: &str) -> Parsed<NetworkInterface> {
    let mut records = Vec::new();
    let mut skipped = 0;
    let mut current: Option<NetworkInterface> = None;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(' ') && !line.starts_with('\t') {
            if let Some(done) = current.take() {
                records.push(done);
            }
            let name = line
                .split(|c: char| c == ':' || c.is_whitespace())
                .next()
                .unwrap_or_default();
            if name.is_empty() {
                skipped += 1;
                continue;
            }
            current = Some(NetworkInterface::named(name));
        }

        let Some(iface) = current.as_mut() else {
            skipped += 1;
            continue;
        };

        if let Some(caps) = INET.captures(line) {
            iface.ip = Some(caps[1].to_string());
            iface.status = "up".to_string();
        }
        if let Some(caps) = NETMASK.captures(line) {
            iface.netmask = Some(caps[1].to_string());
        }
        if let Some(caps) = ETHER.captures(line) {
            iface.mac = Some(caps[1].to_ascii_lowercase());
        }
    }

    if let Some(done) = current.take() {
        records.push(done);
    }

    Parsed::new(records, skipped)
}
