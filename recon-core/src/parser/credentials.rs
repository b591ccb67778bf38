//! John the Ripper output and hash files.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Parsed, metasploit::ShadowEntry};

static CRACKED_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+ password hash(es)? cracked")
        .expect("john summary regex should compile")
});

/// One hashed account. `password` is `None` until john recovers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub password: Option<String>,
}

impl CredentialRecord {
    pub fn is_cracked(&self) -> bool {
        self.password.is_some()
    }
}

/// Result payload of a completed hash-crack job.
///
/// `credentials` lists every account of the hash file in file order;
/// uncracked accounts carry `password: null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrackReport {
    pub cracked_count: usize,
    pub total: usize,
    pub credentials: Vec<CredentialRecord>,
}

impl CrackReport {
    pub fn new(credentials: Vec<CredentialRecord>) -> Self {
        Self {
            cracked_count: credentials
                .iter()
                .filter(|c| c.is_cracked())
                .count(),
            total: credentials.len(),
            credentials,
        }
    }

    pub fn cracked(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.credentials.iter().filter(|c| c.is_cracked())
    }
}

/// Parse `john --show` output (`user:password[:gecos...]`).
pub fn parse_crack_output(raw: &str) -> Parsed<CredentialRecord> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in raw.lines() {
        let line = line.trim_end();
        if line.trim().is_empty()
            || line.starts_with('#')
            || CRACKED_SUMMARY.is_match(line.trim())
        {
            continue;
        }

        let mut parts = line.splitn(3, ':');
        match (parts.next(), parts.next()) {
            (Some(user), Some(password)) if !user.trim().is_empty() => {
                records.push(CredentialRecord {
                    username: user.trim().to_string(),
                    password: Some(password.to_string()),
                });
            }
            _ => skipped += 1,
        }
    }

    Parsed::new(records, skipped)
}

/// Parse a `user:hash` file as written by hash extraction.
pub fn parse_hash_file(raw: &str) -> Parsed<ShadowEntry> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.splitn(3, ':');
        match (parts.next(), parts.next()) {
            (Some(user), Some(hash))
                if !user.is_empty() && !hash.is_empty() =>
            {
                records.push(ShadowEntry {
                    username: user.to_string(),
                    hash: hash.to_string(),
                });
            }
            _ => skipped += 1,
        }
    }

    Parsed::new(records, skipped)
}

/// One record per hashed account in file order, with the password filled in
/// when john cracked it. Cracked accounts john reports that are absent from
/// the hash file are appended at the end.
pub fn merge_credentials(
    accounts: &[ShadowEntry],
    cracked: &[CredentialRecord],
) -> Vec<CredentialRecord> {
    let mut merged: Vec<CredentialRecord> = Vec::with_capacity(accounts.len());

    for account in accounts {
        if merged.iter().any(|c| c.username == account.username) {
            continue;
        }
        let password = cracked
            .iter()
            .find(|c| c.username == account.username)
            .and_then(|c| c.password.clone());
        merged.push(CredentialRecord {
            username: account.username.clone(),
            password,
        });
    }

    for extra in cracked {
        if !merged.iter().any(|c| c.username == extra.username) {
            merged.push(extra.clone());
        }
    }

    merged
}
