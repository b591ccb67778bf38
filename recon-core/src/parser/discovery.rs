//! `netdiscover -P` table output.

use std::{collections::BTreeMap, net::Ipv4Addr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Parsed;

static MAC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}")
        .expect("mac address regex should compile")
});

const UNKNOWN: &str = "Unknown";

/// A live host seen on the local segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub vendor: String,
}

/// Result payload of a completed discovery job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub range: String,
    pub count: usize,
    pub hosts: Vec<HostRecord>,
}

impl DiscoveryReport {
    pub fn new(range: impl Into<String>, hosts: Vec<HostRecord>) -> Self {
        Self {
            range: range.into(),
            count: hosts.len(),
            hosts,
        }
    }
}

/// Parse netdiscover's passive/printable output. Hosts are de-duplicated by
/// address and returned in ascending IP order.
pub fn parse_discovery(raw: &str) -> Parsed<HostRecord> {
    let mut hosts: BTreeMap<Ipv4Addr, HostRecord> = BTreeMap::new();
    let mut skipped = 0;

    for line in raw.lines() {
        let trimmed = line.trim();
        if is_chrome(trimmed) {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(ip) = parts.first().and_then(|p| p.parse::<Ipv4Addr>().ok())
        else {
            skipped += 1;
            continue;
        };

        let mac = MAC_PATTERN
            .find(trimmed)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let vendor = if parts.len() > 4 {
            parts[4..].join(" ")
        } else {
            UNKNOWN.to_string()
        };

        hosts.entry(ip).or_insert(HostRecord { ip, mac, vendor });
    }

    Parsed::new(hosts.into_values().collect(), skipped)
}

/// Banner, header, separator and summary lines.
fn is_chrome(line: &str) -> bool {
    line.is_empty()
        || line.starts_with("--")
        || line.starts_with("Currently scanning")
        || (line.contains("IP") && line.contains("MAC"))
        || line.chars().all(|c| matches!(c, '_' | '-' | ' '))
}
