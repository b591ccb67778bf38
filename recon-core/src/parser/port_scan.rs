//! nmap XML (`-oX -`) output.

use std::borrow::Cow;

use quick_xml::{
    Reader,
    escape::unescape,
    events::{BytesStart, Event},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Parsed;

const UNKNOWN: &str = "unknown";

/// One scanned port of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub number: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    pub product: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PortRecord {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    fn mentions(&self, needle: &str) -> bool {
        [&self.service, &self.product, &self.version]
            .iter()
            .any(|field| field.to_ascii_lowercase().contains(needle))
    }
}

/// Everything extracted from one nmap run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NmapRun {
    /// `status@state` of the first host, `unknown` when absent.
    pub host_state: String,
    pub ports: Parsed<PortRecord>,
}

/// Result payload of a completed port-scan job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScanReport {
    pub target: String,
    pub host_state: String,
    pub open_ports_count: usize,
    pub vsftpd_detected: bool,
    pub ports: Vec<PortRecord>,
}

impl PortScanReport {
    pub fn new(target: impl Into<String>, run: NmapRun) -> Self {
        let ports = run.ports.records;
        let open_ports_count = ports.iter().filter(|p| p.is_open()).count();
        let vsftpd_detected =
            ports.iter().any(|p| p.is_open() && p.mentions("vsftpd"));

        Self {
            target: target.into(),
            host_state: run.host_state,
            open_ports_count,
            vsftpd_detected,
            ports,
        }
    }
}

/// Port records only; see [`parse_nmap_run`] for the host state as well.
pub fn parse_port_scan(raw: &str) -> Parsed<PortRecord> {
    parse_nmap_run(raw).ports
}

#[derive(Default)]
struct PortBuilder {
    portid: Option<String>,
    protocol: Option<String>,
    state: Option<String>,
    service: Option<String>,
    product: Option<String>,
    version: Option<String>,
}

impl PortBuilder {
    fn build(self, address: Option<&String>) -> Option<PortRecord> {
        let number = self
            .portid
            .as_deref()
            .and_then(|id| id.trim().parse::<u16>().ok())
            .filter(|n| *n > 0)?;

        Some(PortRecord {
            number,
            protocol: self.protocol.unwrap_or_else(|| "tcp".to_string()),
            state: self.state.unwrap_or_else(|| UNKNOWN.to_string()),
            service: self.service.unwrap_or_else(|| UNKNOWN.to_string()),
            product: self.product.unwrap_or_default(),
            version: self.version.unwrap_or_default(),
            address: address.cloned(),
        })
    }
}

/// Walk the XML event stream. A port is only recorded once its closing tag
/// has been seen, so truncated documents never yield half-read ports.
pub fn parse_nmap_run(raw: &str) -> NmapRun {
    let mut reader = Reader::from_str(raw);
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut host_state: Option<String> = None;
    let mut in_host = false;
    let mut address: Option<String> = None;
    let mut current: Option<PortBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"host" => {
                    in_host = true;
                    address = None;
                }
                b"port" if in_host => {
                    current = Some(PortBuilder {
                        portid: attr(&e, b"portid"),
                        protocol: attr(&e, b"protocol"),
                        ..PortBuilder::default()
                    });
                }
                _ => apply_leaf(
                    &e,
                    in_host,
                    &mut host_state,
                    &mut address,
                    current.as_mut(),
                ),
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"port" if in_host => {
                    let port = PortBuilder {
                        portid: attr(&e, b"portid"),
                        protocol: attr(&e, b"protocol"),
                        ..PortBuilder::default()
                    };
                    match port.build(address.as_ref()) {
                        Some(record) => records.push(record),
                        None => skipped += 1,
                    }
                }
                _ => apply_leaf(
                    &e,
                    in_host,
                    &mut host_state,
                    &mut address,
                    current.as_mut(),
                ),
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"port" => {
                    if let Some(port) = current.take() {
                        match port.build(address.as_ref()) {
                            Some(record) => records.push(record),
                            None => skipped += 1,
                        }
                    }
                }
                b"host" => {
                    in_host = false;
                    current = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                debug!(
                    position = reader.buffer_position(),
                    error = %err,
                    "nmap xml ended early"
                );
                if current.is_some() {
                    skipped += 1;
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    NmapRun {
        host_state: host_state.unwrap_or_else(|| UNKNOWN.to_string()),
        ports: Parsed::new(records, skipped),
    }
}

fn apply_leaf(
    e: &BytesStart<'_>,
    in_host: bool,
    host_state: &mut Option<String>,
    address: &mut Option<String>,
    current: Option<&mut PortBuilder>,
) {
    if !in_host {
        return;
    }
    match (e.name().as_ref(), current) {
        (b"state", Some(port)) => port.state = attr(e, b"state"),
        (b"service", Some(port)) => {
            port.service = attr(e, b"name");
            port.product = attr(e, b"product");
            port.version = attr(e, b"version");
        }
        (b"status", None) if host_state.is_none() => {
            *host_state = attr(e, b"state");
        }
        (b"address", None) if address.is_none() => {
            *address = attr(e, b"addr");
        }
        _ => {}
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            unescape(&raw).map(Cow::into_owned).unwrap_or(raw)
        })
}
