//! Allow-list checks for operator input.
//!
//! Everything that ends up in a tool's argv or in an msfconsole resource file
//! passes through here first. Values are returned trimmed.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{ReconError, Result},
    session::SessionId,
};

static MODULE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_./-]+$").expect("module regex should compile")
});
static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.:/-]+$").expect("host regex should compile")
});
static PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_./-]+$").expect("path regex should compile")
});
static INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.:-]+$").expect("interface regex should compile")
});
static SEARCH_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_ ./:-]+$").expect("query regex should compile")
});

/// Trimmed, non-empty, no line breaks.
pub fn single_line<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ReconError::invalid(format!("{field} cannot be empty")));
    }
    if value.contains(['\n', '\r']) {
        return Err(ReconError::invalid(format!(
            "{field} must be a single line"
        )));
    }
    Ok(value)
}

fn allow_listed<'a>(
    value: &'a str,
    field: &str,
    pattern: &Regex,
) -> Result<&'a str> {
    let value = single_line(value, field)?;
    if !pattern.is_match(value) {
        return Err(ReconError::invalid(format!(
            "{field} contains invalid characters"
        )));
    }
    if value.starts_with('-') {
        return Err(ReconError::invalid(format!(
            "{field} must not start with '-'"
        )));
    }
    Ok(value)
}

/// Exploit and payload module names.
pub fn module_name(value: &str, field: &str) -> Result<String> {
    allow_listed(value, field, &MODULE_NAME).map(str::to_string)
}

/// IP address, hostname or nmap-style target.
pub fn host(value: &str, field: &str) -> Result<String> {
    allow_listed(value, field, &HOST).map(str::to_string)
}

pub fn path(value: &str, field: &str) -> Result<String> {
    allow_listed(value, field, &PATH).map(str::to_string)
}

pub fn interface(value: &str) -> Result<String> {
    allow_listed(value, "interface", &INTERFACE).map(str::to_string)
}

pub fn search_query(value: &str) -> Result<String> {
    allow_listed(value, "query", &SEARCH_QUERY).map(str::to_string)
}

/// A command run inside an exploit session. Double quotes are rejected
/// because the command is quoted inside the resource file.
pub fn command(value: &str) -> Result<String> {
    let value = single_line(value, "command")?;
    if value.contains('"') {
        return Err(ReconError::invalid(
            "command must not contain double quotes",
        ));
    }
    Ok(value.to_string())
}

pub fn session_id(value: &str) -> Result<SessionId> {
    single_line(value, "session_id")?.parse()
}

/// A john `--format` name such as `md5crypt` or `raw-sha256`.
pub fn hash_format(value: &str) -> Result<String> {
    let value = single_line(value, "format")?;
    let valid = !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ReconError::invalid(format!(
            "format '{value}' is not a john format name"
        )));
    }
    Ok(value.to_string())
}

/// IPv4 address with an optional CIDR prefix, e.g. `192.168.1.0/24`.
pub fn discovery_range(value: &str) -> Result<String> {
    let value = single_line(value, "range")?;
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };

    if addr.parse::<Ipv4Addr>().is_err() {
        return Err(ReconError::invalid(format!(
            "range must be an IPv4 CIDR block (got '{value}')"
        )));
    }
    if let Some(prefix) = prefix {
        match prefix.parse::<u8>() {
            Ok(bits)
                if bits <= 32
                    && prefix.bytes().all(|b| b.is_ascii_digit()) => {}
            _ => {
                return Err(ReconError::invalid(format!(
                    "range prefix must be between 0 and 32 (got '{prefix}')"
                )));
            }
        }
    }
    Ok(value.to_string())
}

/// Comma list of `N` or `N-M` entries in 1..=65535 with `N <= M`.
pub fn port_spec(value: &str) -> Result<String> {
    let value = single_line(value, "ports")?;
    let compact: String =
        value.chars().filter(|c| !c.is_whitespace()).collect();

    for entry in compact.split(',') {
        let (low, high) = match entry.split_once('-') {
            Some((low, high)) => (parse_port(low)?, parse_port(high)?),
            None => {
                let port = parse_port(entry)?;
                (port, port)
            }
        };
        if low > high {
            return Err(ReconError::invalid(format!(
                "port range {entry} is reversed"
            )));
        }
    }
    Ok(compact)
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(port) if port >= 1 && raw.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(port)
        }
        _ => Err(ReconError::invalid(format!(
            "'{raw}' is not a port between 1 and 65535"
        ))),
    }
}
