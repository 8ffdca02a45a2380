//! Service, version and OS fingerprinting delegated to `nmap`.
//!
//! SYN scanning and OS detection need raw sockets, so the adapter reports
//! UNAVAILABLE instead of running a degraded nmap when not privileged.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nexa_common::{
    enrichment::Enricher,
    error::AdapterError,
    network::{ports::PortSet, target::Target},
    report::{self, EnrichmentFragment, Payload, Source, UNKNOWN_SERVICE},
    utils::process,
};
use nexa_protocols::nmap::{self, DeepScan};

const NMAP: &str = "nmap";

pub struct NmapEnricher {
    binary: PathBuf,
    ports: PortSet,
    timeout: Duration,
    require_root: bool,
    cancel: CancellationToken,
}

impl NmapEnricher {
    pub fn new(ports: PortSet, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            binary: PathBuf::from(NMAP),
            ports,
            timeout,
            require_root: true,
            cancel,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Skips the root check. Used when the binary is a stand-in.
    pub fn without_privilege_check(mut self) -> Self {
        self.require_root = false;
        self
    }

    fn arguments(&self, ip: IpAddr) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-p".into(),
            self.ports.to_string(),
            "-sS".into(),
            "-sV".into(),
            "-O".into(),
            "-oX".into(),
            "-".into(),
        ];
        if ip.is_ipv6() {
            args.push("-6".into());
        }
        args.push(ip.to_string());
        args
    }

    async fn fingerprint(&self, target: &Target) -> Result<Payload, AdapterError> {
        let binary = process::which(&self.binary).ok_or_else(|| {
            AdapterError::unavailable(format!("{} not found on PATH", self.binary.display()))
        })?;

        if self.require_root && !is_root::is_root() {
            return Err(AdapterError::unavailable(
                "SYN and OS detection require root privileges",
            ));
        }

        let args = self.arguments(target.ip);
        info!("Running deep scan: {} {}", binary.display(), args.join(" "));

        let output = process::run(&binary, &args, None, self.timeout, &self.cancel).await?;
        if !output.stderr.trim().is_empty() {
            debug!("nmap stderr: {}", output.stderr.trim());
        }

        let scan = nmap::parse(&output.stdout).map_err(|e| AdapterError::failed(e.to_string()))?;
        Ok(Payload::Fields(to_fields(scan)))
    }
}

#[async_trait]
impl Enricher for NmapEnricher {
    fn source(&self) -> Source {
        Source::DeepScan
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn enrich(&self, target: &Target, _open_ports: &[u16]) -> EnrichmentFragment {
        EnrichmentFragment::from_result(Source::DeepScan, self.fingerprint(target).await)
    }
}

fn to_fields(scan: DeepScan) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();

    for port in scan.ports {
        let is_open = port.state == "open";
        fields.insert(report::state_key(port.port), port.state);
        match port.service {
            Some(service) => {
                fields.insert(report::service_key(port.port), service);
            }
            None if is_open => {
                fields.insert(report::service_key(port.port), UNKNOWN_SERVICE.to_string());
            }
            None => {}
        }
    }

    if let Some(best) = scan.os_matches.first() {
        fields.insert("os".into(), best.clone());
    }
    if !scan.hostnames.is_empty() {
        fields.insert("hostnames".into(), scan.hostnames.join(", "));
    }

    fields
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use nexa_common::report::FragmentStatus;
    use nexa_protocols::nmap::ServicePort;
    use std::net::Ipv4Addr;

    fn target() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn enricher() -> NmapEnricher {
        NmapEnricher::new(
            "22,80".parse().unwrap(),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[test]
    fn arguments_request_xml_on_stdout() {
        let args = enricher().arguments(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(
            args,
            vec!["-p", "22,80", "-sS", "-sV", "-O", "-oX", "-", "192.0.2.1"]
        );
    }

    #[test]
    fn fields_mark_unknown_open_services() {
        let scan = DeepScan {
            hostnames: vec![],
            ports: vec![
                ServicePort {
                    port: 22,
                    protocol: "tcp".into(),
                    state: "open".into(),
                    service: Some("ssh OpenSSH 9.6".into()),
                },
                ServicePort {
                    port: 9999,
                    protocol: "tcp".into(),
                    state: "open".into(),
                    service: None,
                },
                ServicePort {
                    port: 23,
                    protocol: "tcp".into(),
                    state: "filtered".into(),
                    service: None,
                },
            ],
            os_matches: vec!["Linux 6.x (96%)".into()],
        };
        let fields = to_fields(scan);
        assert_eq!(fields["service.22"], "ssh OpenSSH 9.6");
        assert_eq!(fields["service.9999"], UNKNOWN_SERVICE);
        assert_eq!(fields["state.23"], "filtered");
        assert!(!fields.contains_key("service.23"));
        assert_eq!(fields["os"], "Linux 6.x (96%)");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let fragment = enricher()
            .with_binary("/nonexistent/nmap")
            .enrich(&target(), &[])
            .await;
        assert_eq!(fragment.status, FragmentStatus::Unavailable);
        assert_eq!(fragment.source, Source::DeepScan);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_output_of_stand_in_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("nmap");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat <<'XML'\n<nmaprun><host><ports>\
             <port protocol=\"tcp\" portid=\"22\"><state state=\"open\"/>\
             <service name=\"ssh\" product=\"OpenSSH\"/></port>\
             </ports></host></nmaprun>\nXML\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fragment = enricher()
            .with_binary(&script)
            .without_privilege_check()
            .enrich(&target(), &[])
            .await;

        assert_eq!(fragment.status, FragmentStatus::Ok, "{:?}", fragment.detail);
        assert_eq!(fragment.payload.field("service.22"), Some("ssh OpenSSH"));
        assert_eq!(fragment.payload.field("state.22"), Some("open"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_output_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("nmap");
        std::fs::write(&script, "#!/bin/sh\necho '<nmaprun><host><ports><port portid=\"oops\"/>'\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fragment = enricher()
            .with_binary(&script)
            .without_privilege_check()
            .enrich(&target(), &[])
            .await;
        assert_eq!(fragment.status, FragmentStatus::Error);
    }
}
