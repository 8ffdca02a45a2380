pub mod scan;

use std::path::PathBuf;

use clap::Parser;
use nexa_common::config::{Config, DEFAULT_OUTPUT, DEFAULT_PORTS};
use nexa_common::error::NexaError;
use nexa_common::network::ports::PortSet;

#[derive(Parser, Debug)]
#[command(name = "nexa")]
#[command(version)]
#[command(about = "Intelligent port scanner with service enrichment and analyst reporting.")]
pub struct CommandLine {
    /// Hostname or IP address to scan
    pub target: String,

    /// Ports to scan, e.g. `22,80,8000-8100`
    #[arg(short, long, default_value = DEFAULT_PORTS)]
    pub ports: PortSet,

    /// Maximum simultaneous connection attempts [default: 200]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Connect timeout in seconds [default: 2.0]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Skip the nmap deep scan
    #[arg(long)]
    pub no_nmap: bool,

    /// Analysis agent executable (searched on PATH when omitted)
    #[arg(long, value_name = "PATH")]
    pub gemini_path: Option<PathBuf>,

    /// Do not hand the report to the analysis agent
    #[arg(long)]
    pub no_agent: bool,

    /// Higher concurrency and shorter timeout, unless set explicitly
    #[arg(long)]
    pub aggressive: bool,

    /// Where to write the JSON report
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Explicit values override the aggressive preset, which overrides defaults.
    pub fn to_config(&self) -> Result<Config, NexaError> {
        let mut cfg = Config::new(self.ports.clone());
        if self.aggressive {
            cfg = cfg.aggressive();
        }
        if let Some(concurrency) = self.concurrency {
            cfg.concurrency = concurrency;
        }
        if let Some(secs) = self.timeout {
            cfg = cfg.with_timeout_secs(secs)?;
        }

        cfg.deep_scan = !self.no_nmap;
        cfg.agent = !self.no_agent;
        cfg.agent_path = self.gemini_path.clone();
        cfg.output = self.output.clone();
        cfg.debug = self.debug;

        cfg.validate()?;
        Ok(cfg)
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
