use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use nexa_common::report::PortState;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Outcome of a single connection attempt.
#[derive(Debug)]
pub struct Probe {
    pub state: PortState,
    /// The established connection, handed on to the banner grabber.
    pub stream: Option<TcpStream>,
}

impl Probe {
    pub fn open(stream: TcpStream) -> Self {
        Self {
            state: PortState::Open,
            stream: Some(stream),
        }
    }

    pub fn classified(state: PortState) -> Self {
        Self { state, stream: None }
    }
}

/// Defines the strategy for probing transport-layer ports.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: SocketAddr, timeout: Duration) -> Probe;
}

/// Full TCP handshake via the operating system's `connect`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: SocketAddr, probe_timeout: Duration) -> Probe {
        connect_within(addr, probe_timeout, TcpStream::connect(addr)).await
    }
}

/// Classifies one connection attempt that must settle within `limit`.
/// An attempt still pending at the deadline is FILTERED.
pub async fn connect_within<F>(addr: SocketAddr, limit: Duration, connect: F) -> Probe
where
    F: Future<Output = io::Result<TcpStream>>,
{
    match timeout(limit, connect).await {
        Ok(Ok(stream)) => Probe::open(stream),
        Ok(Err(e)) => {
            trace!("{addr}: {e}");
            Probe::classified(classify_error(e.kind()))
        }
        Err(_elapsed) => {
            trace!("{addr}: no answer within {limit:?}");
            Probe::classified(PortState::Filtered)
        }
    }
}

/// Only an active refusal proves the host answered for that port.
fn classify_error(kind: ErrorKind) -> PortState {
    match kind {
        ErrorKind::ConnectionRefused => PortState::Closed,
        _ => PortState::Filtered,
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

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProber.probe(addr, Duration::from_secs(1)).await;
        assert_eq!(probe.state, PortState::Open);
        assert!(probe.stream.is_some());
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = TcpProber.probe(addr, Duration::from_secs(1)).await;
        assert_eq!(probe.state, PortState::Closed);
        assert!(probe.stream.is_none());
    }

    #[test]
    fn unreachable_and_reset_are_filtered() {
        assert_eq!(classify_error(ErrorKind::ConnectionReset), PortState::Filtered);
        assert_eq!(classify_error(ErrorKind::TimedOut), PortState::Filtered);
        assert_eq!(classify_error(ErrorKind::ConnectionRefused), PortState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_connect_times_out_as_filtered() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let started = tokio::time::Instant::now();

        let probe = connect_within(
            addr,
            Duration::from_millis(50),
            std::future::pending::<io::Result<TcpStream>>(),
        )
        .await;

        assert_eq!(probe.state, PortState::Filtered);
        assert!(probe.stream.is_none());
        assert_eq!(started.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test]
    #[ignore]
    async fn blackholed_address_times_out_as_filtered() {
        let addr: SocketAddr = "192.0.2.1:80".parse().unwrap();
        let probe = TcpProber.probe(addr, Duration::from_millis(300)).await;
        assert_eq!(probe.state, PortState::Filtered);
    }
}
