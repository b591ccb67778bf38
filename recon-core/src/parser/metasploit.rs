//! msfconsole console output and data pulled through exploit sessions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Parsed;

static MODULE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:exploit|auxiliary)/[A-Za-z0-9_./-]+$")
        .expect("module path regex should compile")
});
static DISCLOSURE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex should compile")
});
static SESSION_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(.+)$").expect("session row regex should compile")
});
static SESSION_OPENED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:Command shell|Meterpreter) session (\d+) opened|Session (\d+) created",
    )
    .expect("session opened regex should compile")
});
static SHADOW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:\s]+):(\$[0-9a-zA-Z$./]+):")
        .expect("shadow regex should compile")
});

const RANKS: &[&str] = &[
    "manual",
    "low",
    "average",
    "normal",
    "good",
    "great",
    "excellent",
];

/// A module row from `search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitModule {
    pub name: String,
    pub rank: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure_date: Option<String>,
    pub description: String,
}

/// A row from `sessions -l`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub info: String,
}

/// A `user:hash` pair, either from `/etc/shadow` or a hash file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowEntry {
    pub username: String,
    pub hash: String,
}

/// Parse the module table printed by `search <term>`.
pub fn parse_search(raw: &str) -> Parsed<ExploitModule> {
    let mut records: Vec<ExploitModule> = Vec::new();
    let mut skipped = 0;

    for line in raw.lines() {
        if !line.contains("exploit/") && !line.contains("auxiliary/") {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(pos) = tokens.iter().position(|t| MODULE_PATH.is_match(t))
        else {
            skipped += 1;
            continue;
        };

        let name = tokens[pos].to_string();
        let mut rest = tokens[pos + 1..].iter().copied().peekable();

        let disclosure_date = rest
            .next_if(|t| DISCLOSURE_DATE.is_match(t))
            .map(str::to_string);
        let rank = rest
            .next_if(|t| RANKS.contains(t))
            .unwrap_or("normal")
            .to_string();
        // Check column.
        rest.next_if(|t| matches!(*t, "Yes" | "No"));
        let description = rest.collect::<Vec<_>>().join(" ");

        if records.iter().any(|m| m.name == name) {
            continue;
        }
        records.push(ExploitModule {
            name,
            rank,
            disclosure_date,
            description,
        });
    }

    Parsed::new(records, skipped)
}

/// Parse `sessions -l`.
pub fn parse_sessions(raw: &str) -> Parsed<RemoteSession> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in raw.lines() {
        let Some(caps) = SESSION_ROW.captures(line) else {
            continue;
        };
        let Ok(id) = caps[1].parse::<u32>() else {
            skipped += 1;
            continue;
        };

        let mut parts = caps[2].split_whitespace();
        match parts.next() {
            Some(kind) => records.push(RemoteSession {
                id,
                kind: kind.to_string(),
                info: parts.collect::<Vec<_>>().join(" "),
            }),
            None => skipped += 1,
        }
    }

    Parsed::new(records, skipped)
}

/// The session number msfconsole reports after a successful exploit.
pub fn extract_session_id(raw: &str) -> Option<u32> {
    let caps = SESSION_OPENED.captures(raw)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Pull crypt(3) hashes out of `/etc/shadow` content. Locked and
/// passwordless accounts (`*`, `!`, empty) count as skipped.
pub fn parse_shadow(raw: &str) -> Parsed<ShadowEntry> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in raw.lines() {
        let line = line.trim();
        if !line.contains(':') {
            continue;
        }
        match SHADOW_LINE.captures(line) {
            Some(caps) => records.push(ShadowEntry {
                username: caps[1].to_string(),
                hash: caps[2].to_string(),
            }),
            None => skipped += 1,
        }
    }

    Parsed::new(records, skipped)
}
