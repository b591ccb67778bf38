//! Normalizes raw tool output into structured records.
//!
//! Every parser is a pure function over the captured text. Lines (or XML
//! elements) that cannot be understood are dropped and counted in
//! [`Parsed::skipped`]; parsing never fails outright.

pub mod credentials;
pub mod discovery;
pub mod interfaces;
pub mod metasploit;
pub mod port_scan;

pub use credentials::{
    CrackReport, CredentialRecord, merge_credentials, parse_crack_output,
    parse_hash_file,
};
pub use discovery::{DiscoveryReport, HostRecord, parse_discovery};
pub use interfaces::{NetworkInterface, parse_interfaces};
pub use metasploit::{
    ExploitModule, RemoteSession, ShadowEntry, extract_session_id,
    parse_search, parse_sessions, parse_shadow,
};
pub use port_scan::{
    NmapRun, PortRecord, PortScanReport, parse_nmap_run, parse_port_scan,
};

/// Records extracted from one blob of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    /// Lines that looked like data but could not be parsed.
    pub skipped: usize,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> Parsed<T> {
    pub fn new(records: Vec<T>, skipped: usize) -> Self {
        Self { records, skipped }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
