//! Client configuration: a plain-text `key=value` file naming the fleet of
//! storage nodes. Not TOML/YAML/JSON — this key=value shape is what the
//! node fleet's operators already hand-maintain.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Address of one configured storage node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

/// Parsed client configuration: the ordered list of storage nodes to
/// contact, indexed `1..=N` in the source file.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub nodes: Vec<NodeAddr>,
}

impl Config {
    /// Load and parse a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text. Recognizes `serverK_ip` / `serverK_port`
    /// for `K = 1..N`. Every index that appears must have both keys present;
    /// any missing key is a fatal configuration error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::config(format!("malformed config line {}: {line:?}", lineno + 1))
            })?;
            raw.insert(key.trim().to_string(), value.trim().to_string());
        }

        let mut indices: Vec<u32> = raw
            .keys()
            .filter_map(|k| parse_server_index(k))
            .collect();
        indices.sort_unstable();
        indices.dedup();

        if indices.is_empty() {
            return Err(Error::config(
                "no serverK_ip/serverK_port entries found in configuration",
            ));
        }

        let mut nodes = Vec::with_capacity(indices.len());
        for k in indices {
            let ip_key = format!("server{k}_ip");
            let port_key = format!("server{k}_port");

            let ip_str = raw
                .get(&ip_key)
                .ok_or_else(|| Error::config(format!("missing required key {ip_key}")))?;
            let port_str = raw
                .get(&port_key)
                .ok_or_else(|| Error::config(format!("missing required key {port_key}")))?;

            let ip = Ipv4Addr::from_str(ip_str)
                .map_err(|e| Error::config(format!("invalid {ip_key} {ip_str:?}: {e}")))?;
            let port: u16 = port_str
                .parse()
                .map_err(|e| Error::config(format!("invalid {port_key} {port_str:?}: {e}")))?;

            nodes.push(NodeAddr { ip, port });
        }

        Ok(Self { nodes })
    }
}

/// Extracts `K` from a key of the form `serverK_ip` or `serverK_port`.
fn parse_server_index(key: &str) -> Option<u32> {
    let rest = key.strip_prefix("server")?;
    let rest = rest.strip_suffix("_ip").or_else(|| rest.strip_suffix("_port"))?;
    rest.parse().ok()
}
