//! Registration data over plain WHOIS (TCP/43).
//!
//! The query starts at IANA, which knows every registry, and follows at most
//! one referral to the authoritative server.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use nexa_common::{
    enrichment::Enricher,
    error::AdapterError,
    network::target::Target,
    report::{EnrichmentFragment, Payload, Source},
};
use nexa_protocols::whois::{self, IANA_SERVER, WHOIS_PORT};

const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

pub struct WhoisEnricher {
    server: String,
    port: u16,
    timeout: Duration,
}

impl WhoisEnricher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            server: IANA_SERVER.to_string(),
            port: WHOIS_PORT,
            timeout,
        }
    }

    /// Starts the lookup at `server:port` instead of IANA.
    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    async fn lookup(&self, target: &Target) -> Result<Payload, AdapterError> {
        let query = target.query_name();
        let mut server = self.server.clone();
        let mut response = query_server(&server, self.port, &query, self.timeout).await?;

        if let Some(referred) = whois::referral(&response)
            && !referred.eq_ignore_ascii_case(&server)
        {
            debug!("whois referral from {server} to {referred}");
            match query_server(&referred, WHOIS_PORT, &query, self.timeout).await {
                Ok(text) => {
                    response = text;
                    server = referred;
                }
                Err(e) => debug!("whois referral to {referred} failed: {e}"),
            }
        }

        let mut fields: BTreeMap<String, String> = whois::extract_fields(&response);
        fields.insert("query".into(), query);
        fields.insert("server".into(), server);
        fields.insert("raw".into(), response.trim().to_string());
        Ok(Payload::Fields(fields))
    }
}

async fn query_server(
    server: &str,
    port: u16,
    query: &str,
    budget: Duration,
) -> Result<String, AdapterError> {
    let exchange = async {
        let mut stream = TcpStream::connect((server, port)).await?;
        stream.write_all(&whois::request(query)).await?;

        let mut buf: Vec<u8> = Vec::new();
        (&mut stream).take(MAX_RESPONSE_BYTES).read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    };

    let bytes = timeout(budget, exchange)
        .await
        .map_err(|_| AdapterError::failed(format!("{server} did not answer within {budget:?}")))?
        .map_err(|e| AdapterError::failed(format!("{server}: {e}")))?;

    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.trim().is_empty() {
        return Err(AdapterError::failed(format!("{server} returned an empty response")));
    }
    Ok(text)
}

#[async_trait]
impl Enricher for WhoisEnricher {
    fn source(&self) -> Source {
        Source::Whois
    }

    fn timeout(&self) -> Duration {
        // Two round trips when a referral is followed.
        self.timeout * 2
    }

    async fn enrich(&self, target: &Target, _open_ports: &[u16]) -> EnrichmentFragment {
        EnrichmentFragment::from_result(Source::Whois, self.lookup(target).await)
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
