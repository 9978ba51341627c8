//! Command-line interface

use clap::Parser;
use printlink_settings::Config;
use std::net::IpAddr;
use std::path::PathBuf;

/// printlink -- share one 3D printer between many WebSocket clients
#[derive(Debug, Parser)]
#[command(
    name = "printlink",
    version,
    about = "Multiplex a line-oriented printer firmware link over WebSocket",
    long_about = "Opens the printer device once and lets any number of WebSocket clients\n\
        watch its output and send it commands, one whole line at a time.\n\n\
        With --connect, runs as a client instead: connects to a gateway, keeps\n\
        the command queue and status polling going, and sends lines read from\n\
        standard input."
)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, short = 'c', env = "PRINTLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device path (pseudo terminal or serial port)
    #[arg(long, short = 'd', env = "PRINTLINK_DEVICE")]
    pub device: Option<PathBuf>,

    /// Open the device as a serial port at this baud rate
    #[arg(long, short = 'b')]
    pub baud: Option<u32>,

    /// Address to listen on
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PRINTLINK_PORT")]
    pub port: Option<u16>,

    /// Connect to a gateway at this WebSocket URL instead of serving
    #[arg(long, value_name = "URL")]
    pub connect: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Do not mirror device output to standard output
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl Cli {
    /// Load the configuration and apply command-line overrides
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_file(path)?,
            None => Config::load_or_default()?,
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite file values with the flags that were given
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device.path = device.clone();
        }
        if self.baud.is_some() {
            config.device.baud_rate = self.baud;
        }
        if let Some(bind) = self.bind {
            config.gateway.bind_address = bind.to_string();
        }
        if let Some(port) = self.port {
            config.gateway.port = port;
        }
        if self.log_json {
            config.logging.json = true;
        }
        if self.quiet {
            config.gateway.mirror_to_stdout = false;
        }
    }
}
