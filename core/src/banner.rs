//! Banner grabbing on connections the scanner already established.

use std::sync::Arc;
use std::time::Duration;

use nexa_protocols::banner::{self, MAX_BANNER_BYTES};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Text read from a service plus what it looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub protocol_hint: Option<String>,
}

#[derive(Clone)]
pub struct BannerGrabber {
    host: String,
    read_timeout: Duration,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl BannerGrabber {
    /// `host` goes into the `Host` header of HTTP probes.
    pub fn new(
        host: impl Into<String>,
        read_timeout: Duration,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host: host.into(),
            read_timeout,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel,
        }
    }

    /// Reads whatever the service offers within the read timeout.
    ///
    /// Never fails: I/O errors and silence both yield `None`.
    pub async fn grab(&self, port: u16, mut stream: TcpStream) -> Option<Banner> {
        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit.ok()?,
            _ = self.cancel.cancelled() => return None,
        };

        let bytes = tokio::select! {
            bytes = self.exchange(port, &mut stream) => bytes,
            _ = self.cancel.cancelled() => return None,
        };

        let text = banner::normalize(&bytes)?;
        let protocol_hint = banner::protocol_hint(port, Some(&text)).map(str::to_string);
        Some(Banner { text, protocol_hint })
    }

    async fn exchange(&self, port: u16, stream: &mut TcpStream) -> Vec<u8> {
        let deadline = Instant::now() + self.read_timeout;
        let request = banner::probe_for(port, &self.host);
        let passive = request.is_none();

        if let Some(request) = request {
            match timeout_at(deadline, stream.write_all(&request)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("port {port}: probe write failed: {e}");
                    return Vec::new();
                }
                Err(_) => return Vec::new(),
            }
        }

        let mut collected: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 1024];
        while collected.len() < MAX_BANNER_BYTES {
            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    let room = MAX_BANNER_BYTES - collected.len();
                    collected.extend_from_slice(&chunk[..n.min(room)]);
                    // A greeting arrives in one piece, only request/response
                    // exchanges are worth reading to the end.
                    if passive {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    debug!("port {port}: banner read failed: {e}");
                    break;
                }
                Err(_) => break,
            }
        }
        collected
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
