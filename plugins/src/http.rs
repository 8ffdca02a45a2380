//! Response headers of the target's web server.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, redirect::Policy};
use tracing::debug;

use nexa_common::{
    enrichment::{Enricher, Phase},
    error::AdapterError,
    network::target::Target,
    report::{EnrichmentFragment, Payload, Source},
};

pub const HTTP_CANDIDATE_PORTS: [u16; 4] = [80, 443, 8080, 8443];
const TLS_PORTS: [u16; 2] = [443, 8443];

pub struct HttpEnricher {
    ports: Vec<u16>,
    timeout: Duration,
}

impl HttpEnricher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ports: HTTP_CANDIDATE_PORTS.to_vec(),
            timeout,
        }
    }

    pub fn with_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }

    /// Lowest confirmed-open candidate port.
    fn select_port(&self, open_ports: &[u16]) -> Option<u16> {
        open_ports
            .iter()
            .copied()
            .filter(|port| self.ports.contains(port))
            .min()
    }

    fn url(target: &Target, port: u16) -> String {
        let scheme = if TLS_PORTS.contains(&port) { "https" } else { "http" };
        format!("{scheme}://{}:{port}/", target.url_host())
    }

    async fn fetch_headers(&self, target: &Target, open_ports: &[u16]) -> Result<Payload, AdapterError> {
        let port = self.select_port(open_ports).ok_or_else(|| {
            AdapterError::unavailable("no open HTTP port among 80, 443, 8080, 8443")
        })?;
        let url = Self::url(target, port);
        debug!("HEAD {url}");

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true);
        // The name still goes out as Host and SNI, but the connection lands on
        // the address that was scanned, not on a fresh lookup.
        if let Some(name) = &target.hostname {
            builder = builder.resolve(name, SocketAddr::new(target.ip, port));
        }
        let client = builder
            .build()
            .map_err(|e| AdapterError::failed(format!("http client: {e}")))?;

        let response = client
            .head(&url)
            .send()
            .await
            .map_err(|e| AdapterError::failed(format!("{url}: {e}")))?;

        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            fields
                .entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        fields.insert("status".into(), response.status().as_u16().to_string());
        fields.insert("url".into(), url);
        Ok(Payload::Fields(fields))
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    fn source(&self) -> Source {
        Source::Http
    }

    fn phase(&self) -> Phase {
        Phase::AfterScan
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn enrich(&self, target: &Target, open_ports: &[u16]) -> EnrichmentFragment {
        EnrichmentFragment::from_result(Source::Http, self.fetch_headers(target, open_ports).await)
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
