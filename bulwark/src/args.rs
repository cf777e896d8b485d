use std::{fmt, io::IsTerminal, net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;

/// Workspace crates whose records follow `--log`. Everything else stays at `warn`.
const CRATES: [&str; 4] = ["bulwark", "server", "csrf", "config"];

#[derive(Debug, Parser)]
#[command(name = "Bulwark", version, long_about = concat!("Bulwark v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// Address to accept connections on. Overrides `server.listen_address`.
    /// Default: 127.0.0.1:8000
    #[arg(short, long, env = "BULWARK_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file
    #[arg(long, short, env = "BULWARK_CONFIG_PATH", default_value = "./bulwark.toml")]
    pub config: PathBuf,
    /// Log level of the Bulwark crates
    #[arg(long = "log", env = "BULWARK_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Format of the log output
    #[arg(long, env = "BULWARK_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

impl Args {
    /// Loads the configuration file. A missing file means defaults, with CSRF protection on.
    pub fn config(&self) -> anyhow::Result<Config> {
        if !self.config.exists() {
            return Ok(Config::default());
        }

        Config::load(&self.config)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colored text, the default on a terminal
    Color,
    /// Plain text, the default otherwise
    Text,
    /// One JSON object per record
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        };

        f.write_str(name)
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Nothing
    Off,
    /// Errors only
    Error,
    /// Errors and warnings
    Warn,
    /// Also informational messages
    #[default]
    Info,
    /// Also CSRF decisions and session changes
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> EnvFilter {
        let directives = match self {
            LogLevel::Off => "off".to_string(),
            level => CRATES
                .iter()
                .fold(String::from("warn"), |acc, name| format!("{acc},{name}={level}")),
        };

        EnvFilter::from_str(&directives).expect("These all are valid env filters.")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        f.write_str(name)
    }
}
