//! Auxiliary DNS records: reverse lookup of the address and, for named
//! targets, A, NS and MX records.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;

use nexa_common::{
    enrichment::Enricher,
    error::AdapterError,
    network::target::Target,
    report::{EnrichmentFragment, Payload, Source},
};
use nexa_protocols::dns::{self, DNS_PORT, DnsRecord, RecordKind};

const RESOLV_CONF: &str = "/etc/resolv.conf";
const FALLBACK_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
const MAX_DNS_PACKET: usize = 4096;

pub struct DnsEnricher {
    resolver: SocketAddr,
    timeout: Duration,
}

impl DnsEnricher {
    pub fn new(resolver: SocketAddr, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Uses the first `nameserver` of the system configuration.
    pub fn from_system(timeout: Duration) -> Self {
        let resolver = std::fs::read_to_string(RESOLV_CONF)
            .ok()
            .and_then(|conf| first_nameserver(&conf))
            .unwrap_or(FALLBACK_RESOLVER);
        debug!("DNS enrichment via {resolver}");
        Self::new(SocketAddr::new(resolver, DNS_PORT), timeout)
    }

    fn questions(target: &Target) -> Vec<(String, RecordKind)> {
        let mut questions = vec![(dns::reverse_address_to_ptr(&target.ip), RecordKind::Ptr)];
        if let Some(hostname) = &target.hostname {
            let zone = target.query_name();
            questions.push((hostname.clone(), RecordKind::A));
            questions.push((zone.clone(), RecordKind::Ns));
            questions.push((zone, RecordKind::Mx));
        }
        questions
    }

    async fn lookup(&self, target: &Target) -> Result<Payload, AdapterError> {
        let mut queries: JoinSet<(RecordKind, anyhow::Result<Vec<DnsRecord>>)> = JoinSet::new();
        for (name, kind) in Self::questions(target) {
            let resolver = self.resolver;
            let budget = self.timeout;
            queries.spawn(async move { (kind, query(resolver, &name, kind, budget).await) });
        }

        let mut answered = 0usize;
        let mut first_error: Option<String> = None;
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();

        while let Some(joined) = queries.join_next().await {
            let Ok((kind, result)) = joined else { continue };
            match result {
                Ok(records) => {
                    answered += 1;
                    for record in records {
                        values.entry(record.kind.to_string()).or_default().push(record.value);
                    }
                }
                Err(e) => {
                    debug!("DNS {kind} query failed: {e:#}");
                    first_error.get_or_insert_with(|| format!("{kind} query: {e:#}"));
                }
            }
        }

        if answered == 0 {
            return Err(AdapterError::failed(
                first_error.unwrap_or_else(|| "no DNS query completed".into()),
            ));
        }

        let mut fields: BTreeMap<String, String> = values
            .into_iter()
            .map(|(key, mut list)| {
                list.sort();
                list.dedup();
                (key, list.join(", "))
            })
            .collect();
        fields.insert("resolver".into(), self.resolver.to_string());
        Ok(Payload::Fields(fields))
    }
}

async fn query(
    resolver: SocketAddr,
    name: &str,
    kind: RecordKind,
    budget: Duration,
) -> anyhow::Result<Vec<DnsRecord>> {
    let id: u16 = rand::random();
    let packet = dns::create_query_packet(name, kind, id)?;

    let bind_addr: SocketAddr = if resolver.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };

    let exchange = async {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(resolver).await?;
        socket.send(&packet).await?;

        let mut buf = vec![0u8; MAX_DNS_PACKET];
        loop {
            let len = socket.recv(&mut buf).await?;
            match dns::parse_response(&buf[..len], id) {
                Ok(records) => return Ok(records),
                // Stray or mismatched datagram, keep waiting for ours.
                Err(e) => debug!("ignoring DNS datagram: {e:#}"),
            }
        }
    };

    timeout(budget, exchange)
        .await
        .map_err(|_| anyhow::anyhow!("{resolver} did not answer within {budget:?}"))?
}

fn first_nameserver(conf: &str) -> Option<IpAddr> {
    conf.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("nameserver"), Some(addr)) => addr.split('%').next()?.parse().ok(),
                _ => None,
            }
        })
}

#[async_trait]
impl Enricher for DnsEnricher {
    fn source(&self) -> Source {
        Source::Dns
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn enrich(&self, target: &Target, _open_ports: &[u16]) -> EnrichmentFragment {
        EnrichmentFragment::from_result(Source::Dns, self.lookup(target).await)
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
