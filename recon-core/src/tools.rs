//! Command lines for the external tools.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    job::{DiscoveryParams, PortScanParams},
    runner::CommandSpec,
};

pub const DEFAULT_HASH_FORMAT: &str = "sha512crypt";

/// john `--format` name for a crypt(3) hash, from its `$id$` prefix.
pub fn john_format_for(hash: &str) -> Option<&'static str> {
    let id = hash.strip_prefix('$')?.split('$').next()?;
    match id {
        "1" => Some("md5crypt"),
        "2a" | "2b" | "2y" => Some("bcrypt"),
        "5" => Some("sha256crypt"),
        "6" => Some("sha512crypt"),
        "y" | "7" | "gy" => Some("crypt"),
        _ => None,
    }
}

/// Where each tool lives. Bare names are resolved on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub nmap: PathBuf,
    pub netdiscover: PathBuf,
    pub john: PathBuf,
    pub msfconsole: PathBuf,
    pub ifconfig: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            nmap: PathBuf::from("nmap"),
            netdiscover: PathBuf::from("netdiscover"),
            john: PathBuf::from("john"),
            msfconsole: PathBuf::from("msfconsole"),
            ifconfig: PathBuf::from("ifconfig"),
        }
    }
}

fn program(path: &Path) -> CommandSpec {
    CommandSpec::new(path.to_string_lossy())
}

impl ToolPaths {
    /// `netdiscover -r <range> -P [-i <iface>]`
    pub fn discovery(&self, params: &DiscoveryParams) -> CommandSpec {
        let spec = program(&self.netdiscover).args([
            "-r",
            params.range.as_str(),
            "-P",
        ]);
        match &params.interface {
            Some(iface) => spec.args(["-i", iface.as_str()]),
            None => spec,
        }
    }

    /// `nmap -sS|-sT|-sU -sV -p <ports> -oX - <target>`. Version detection
    /// supplies the banners used to spot vsftpd.
    pub fn port_scan(&self, params: &PortScanParams) -> CommandSpec {
        program(&self.nmap)
            .arg(params.scan_type.nmap_flag())
            .args(["-sV", "-p", params.ports.as_str(), "-oX", "-", "--"])
            .arg(&params.target)
    }

    /// `john --format=<format> [--wordlist=<wordlist>] <hash_file>`
    pub fn crack(
        &self,
        hash_file: &Path,
        wordlist: Option<&Path>,
        format: &str,
    ) -> CommandSpec {
        let spec = program(&self.john).arg(format!("--format={format}"));
        let spec = match wordlist {
            Some(wordlist) => {
                spec.arg(format!("--wordlist={}", wordlist.to_string_lossy()))
            }
            None => spec,
        };
        spec.arg(hash_file.to_string_lossy())
    }

    /// `john --show --format=<format> <hash_file>`
    pub fn crack_status(&self, hash_file: &Path, format: &str) -> CommandSpec {
        program(&self.john)
            .arg("--show")
            .arg(format!("--format={format}"))
            .arg(hash_file.to_string_lossy())
    }

    /// `ifconfig -a`
    pub fn interfaces(&self) -> CommandSpec {
        program(&self.ifconfig).arg("-a")
    }

    /// `msfconsole -q -r <resource file>`
    pub fn msf_resource(&self, resource: &Path) -> CommandSpec {
        program(&self.msfconsole)
            .args(["-q", "-r"])
            .arg(resource.to_string_lossy())
    }

    /// `msfconsole -q -x "<commands>; exit"`
    pub fn msf_inline(&self, commands: &str) -> CommandSpec {
        program(&self.msfconsole)
            .args(["-q", "-x"])
            .arg(format!("{commands}; exit"))
    }
}
