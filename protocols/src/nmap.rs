//! # Nmap XML
//!
//! Minimal model of `nmap -oX` output: hosts, ports, services and OS matches.
//! Everything else in the document is ignored, and every section we do read is
//! optional so partial or privilege-degraded runs still parse.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NmapError {
    #[error("empty nmap output")]
    Empty,
    #[error("malformed nmap XML: {0}")]
    Malformed(#[from] quick_xml::DeError),
}

#[derive(Debug, Default, Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<XmlHost>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlHost {
    #[serde(default)]
    hostnames: Option<XmlHostnames>,
    #[serde(default)]
    ports: Option<XmlPorts>,
    #[serde(default)]
    os: Option<XmlOs>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlHostnames {
    #[serde(rename = "hostname", default)]
    hostnames: Vec<XmlHostname>,
}

#[derive(Debug, Deserialize)]
struct XmlHostname {
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct XmlPorts {
    #[serde(rename = "port", default)]
    ports: Vec<XmlPort>,
}

#[derive(Debug, Deserialize)]
struct XmlPort {
    #[serde(rename = "@portid")]
    portid: u16,
    #[serde(rename = "@protocol", default)]
    protocol: String,
    #[serde(default)]
    state: Option<XmlState>,
    #[serde(default)]
    service: Option<XmlService>,
}

#[derive(Debug, Deserialize)]
struct XmlState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Default, Deserialize)]
struct XmlService {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
    #[serde(rename = "@extrainfo", default)]
    extrainfo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlOs {
    #[serde(rename = "osmatch", default)]
    matches: Vec<XmlOsMatch>,
}

#[derive(Debug, Deserialize)]
struct XmlOsMatch {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@accuracy", default)]
    accuracy: Option<String>,
}

/// One port as nmap saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub port: u16,
    pub protocol: String,
    /// `open`, `closed`, `filtered`, ...
    pub state: String,
    /// `name product version extrainfo`, omitting empty parts.
    pub service: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepScan {
    pub hostnames: Vec<String>,
    pub ports: Vec<ServicePort>,
    /// Best OS match first.
    pub os_matches: Vec<String>,
}

/// Parses an nmap XML document. Only the first host is considered, the tool
/// scans exactly one target per run.
pub fn parse(xml: &str) -> Result<DeepScan, NmapError> {
    if xml.trim().is_empty() {
        return Err(NmapError::Empty);
    }

    let run: NmapRun = quick_xml::de::from_str(xml)?;
    let Some(host) = run.hosts.into_iter().next() else {
        return Ok(DeepScan::default());
    };

    let hostnames: Vec<String> = host
        .hostnames
        .map(|h| h.hostnames.into_iter().map(|n| n.name).collect())
        .unwrap_or_default();

    let mut ports: Vec<ServicePort> = host
        .ports
        .map(|p| p.ports)
        .unwrap_or_default()
        .into_iter()
        .map(|port| ServicePort {
            port: port.portid,
            protocol: port.protocol,
            state: port.state.map(|s| s.state).unwrap_or_else(|| "unknown".into()),
            service: port.service.and_then(describe_service),
        })
        .collect();
    ports.sort_by_key(|p| p.port);

    let os_matches: Vec<String> = host
        .os
        .map(|os| os.matches)
        .unwrap_or_default()
        .into_iter()
        .map(|m| match m.accuracy {
            Some(accuracy) => format!("{} ({accuracy}%)", m.name),
            None => m.name,
        })
        .collect();

    Ok(DeepScan {
        hostnames,
        ports,
        os_matches,
    })
}

fn describe_service(service: XmlService) -> Option<String> {
    let parts: Vec<String> = [
        service.name,
        service.product,
        service.version,
        service.extrainfo,
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
