use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use nexa_common::config::Config;
use nexa_common::enrichment::{Enricher, Phase};
use nexa_common::network::ports::PortSet;
use nexa_common::network::target::Target;
use nexa_common::report::{EnrichmentFragment, Payload, PortState, Source};
use nexa_core::network::tcp::{Probe, Prober};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

pub fn localhost() -> Target {
    Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Config with the deep scan and the agent off, suitable for loopback runs.
pub fn config(ports: &str) -> Config {
    let ports: PortSet = ports.parse().unwrap();
    let mut cfg = Config::new(ports);
    cfg.deep_scan = false;
    cfg.agent = false;
    cfg.connect_timeout = Duration::from_secs(1);
    cfg
}

/// Listener that greets every client with `greeting` and keeps the
/// connection open for a moment.
pub async fn greeting_listener(greeting: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = stream.write_all(greeting).await;
                tokio::time::sleep(Duration::from_secs(2)).await;
            });
        }
    });
    port
}

/// A loopback port nothing listens on.
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Answers from a fixed table after a fixed delay, without touching the network.
pub struct FakeProber {
    pub open: Vec<u16>,
    pub closed: Vec<u16>,
    pub delay: Duration,
}

impl FakeProber {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            open: Vec::new(),
            closed: Vec::new(),
            delay,
        }
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, addr: SocketAddr, _timeout: Duration) -> Probe {
        tokio::time::sleep(self.delay).await;
        let state = if self.open.contains(&addr.port()) {
            PortState::Open
        } else if self.closed.contains(&addr.port()) {
            PortState::Closed
        } else {
            PortState::Filtered
        };
        Probe::classified(state)
    }
}

pub enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

pub struct StubEnricher {
    pub source: Source,
    pub phase: Phase,
    pub delay: Duration,
    pub behaviour: Behaviour,
}

impl StubEnricher {
    pub fn boxed(source: Source, delay: Duration) -> Box<dyn Enricher> {
        Box::new(Self {
            source,
            phase: Phase::WithScan,
            delay,
            behaviour: Behaviour::Succeed,
        })
    }
}

#[async_trait]
impl Enricher for StubEnricher {
    fn source(&self) -> Source {
        self.source
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn enrich(&self, _target: &Target, open_ports: &[u16]) -> EnrichmentFragment {
        tokio::time::sleep(self.delay).await;
        match self.behaviour {
            Behaviour::Succeed => EnrichmentFragment::ok(
                self.source,
                Payload::Text(format!("{} open", open_ports.len())),
            ),
            Behaviour::Fail => EnrichmentFragment::error(self.source, "stub failure"),
            Behaviour::Panic => panic!("stub adapter blew up"),
        }
    }
}
