//! Run configuration threaded through every component at construction time.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::NexaError;
use crate::network::ports::PortSet;

pub const DEFAULT_PORTS: &str = "1-1024";
pub const DEFAULT_CONCURRENCY: usize = 200;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_millis(900);
pub const DEFAULT_ENRICH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DEEP_SCAN_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_AGENT: &str = "gemini";
pub const DEFAULT_OUTPUT: &str = "nexa-report.json";

pub const AGGRESSIVE_CONCURRENCY: usize = 500;
pub const AGGRESSIVE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub const MAX_CONCURRENCY: usize = 10_000;
pub const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    pub ports: PortSet,
    /// Upper bound on simultaneous connection attempts.
    pub concurrency: usize,
    pub connect_timeout: Duration,
    /// Read timeout for banner grabs. Never exceeds `connect_timeout`,
    /// see [`Config::banner_timeout`].
    pub banner_timeout: Duration,
    /// Per-adapter budget for WHOIS, DNS and HTTP enrichment.
    pub enrich_timeout: Duration,
    pub deep_scan_timeout: Duration,
    pub agent_timeout: Duration,
    /// Disabled by `--no-nmap`.
    pub deep_scan: bool,
    /// Disabled by `--no-agent`.
    pub agent: bool,
    /// Explicit analysis-agent executable. `None` searches `PATH`.
    pub agent_path: Option<PathBuf>,
    pub output: PathBuf,
    pub debug: bool,
}

impl Config {
    pub fn new(ports: PortSet) -> Self {
        Self {
            ports,
            concurrency: DEFAULT_CONCURRENCY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
            enrich_timeout: DEFAULT_ENRICH_TIMEOUT,
            deep_scan_timeout: DEFAULT_DEEP_SCAN_TIMEOUT,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            deep_scan: true,
            agent: true,
            agent_path: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            debug: false,
        }
    }

    /// Applies the aggressive preset. Values the caller sets afterwards win.
    pub fn aggressive(mut self) -> Self {
        self.concurrency = AGGRESSIVE_CONCURRENCY;
        self.connect_timeout = AGGRESSIVE_CONNECT_TIMEOUT;
        self
    }

    /// Sets the connect timeout from fractional seconds as given on the command line.
    pub fn with_timeout_secs(mut self, secs: f64) -> Result<Self, NexaError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(NexaError::InvalidConfig(format!(
                "timeout must be a positive number of seconds, got {secs}"
            )));
        }
        self.connect_timeout = Duration::try_from_secs_f64(secs)
            .map_err(|e| NexaError::InvalidConfig(format!("timeout {secs}s: {e}")))?;
        Ok(self)
    }

    /// Banner reads are bounded by the connect timeout.
    pub fn banner_timeout(&self) -> Duration {
        self.banner_timeout.min(self.connect_timeout)
    }

    pub fn validate(&self) -> Result<(), NexaError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(NexaError::InvalidConfig(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.connect_timeout.is_zero() || self.connect_timeout > MAX_CONNECT_TIMEOUT {
            return Err(NexaError::InvalidConfig(format!(
                "timeout must be within (0, {}] seconds, got {:?}",
                MAX_CONNECT_TIMEOUT.as_secs(),
                self.connect_timeout
            )));
        }
        if self.ports.is_empty() {
            return Err(NexaError::InvalidConfig("no ports to scan".into()));
        }
        Ok(())
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
