//! Server Configuration
//!
//! Command-line parsing for the server binary. Parsing never exits the
//! process; it returns an [`Invocation`] and leaves printing and exiting to
//! `main`.

use crate::protocol::frame::{FrameDecoder, DEFAULT_MAX_PAYLOAD};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default sweeper period in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Errors from parsing command-line arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(ServerConfig),
    Help,
    Version,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the four dump files
    pub data_dir: PathBuf,
    /// Sweeper period; None disables the sweeper
    pub sweep_interval: Option<Duration>,
    /// Largest accepted frame payload in bytes
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("."),
            sweep_interval: Some(Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS)),
            max_frame_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ServerConfig {
    /// Parses arguments, not including the program name.
    ///
    /// # Example
    ///
    /// ```
    /// use typedkv::config::{Invocation, ServerConfig};
    ///
    /// let invocation = ServerConfig::from_args(["--port", "8080"]).unwrap();
    /// match invocation {
    ///     Invocation::Run(config) => assert_eq!(config.bind_address(), "0.0.0.0:8080"),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn from_args<I, S>(args: I) -> Result<Invocation, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = ServerConfig::default();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = required(&arg, args.next())?;
                }
                "--port" | "-p" => {
                    config.port = parsed(&arg, args.next())?;
                }
                "--data-dir" | "-d" => {
                    config.data_dir = PathBuf::from(required(&arg, args.next())?);
                }
                "--sweep-interval" => {
                    let ms: u64 = parsed(&arg, args.next())?;
                    config.sweep_interval = (ms > 0).then(|| Duration::from_millis(ms));
                }
                "--max-frame-size" => {
                    let size: usize = parsed(&arg, args.next())?;
                    if size == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: arg,
                            value: size.to_string(),
                        });
                    }
                    config.max_frame_size = size;
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => match other.parse::<u16>() {
                    // A bare number is the port
                    Ok(port) => config.port = port,
                    Err(_) => return Err(ConfigError::UnknownArgument(arg)),
                },
            }
        }

        Ok(Invocation::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// A frame decoder enforcing the configured payload limit.
    pub fn frame_decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.max_frame_size)
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parsed<T: FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = required(flag, value)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_config(args: &[&str]) -> ServerConfig {
        match ServerConfig::from_args(args.iter().copied()).unwrap() {
            Invocation::Run(config) => config,
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = run_config(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:6379");
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(1)));
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_all_flags() {
        let config = run_config(&[
            "-h",
            "127.0.0.1",
            "-p",
            "7000",
            "-d",
            "/var/lib/typedkv",
            "--sweep-interval",
            "250",
            "--max-frame-size",
            "1024",
        ]);
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/typedkv"));
        assert_eq!(config.sweep_interval, Some(Duration::from_millis(250)));
        assert_eq!(config.frame_decoder().max_payload(), 1024);
    }

    #[test]
    fn test_positional_port() {
        assert_eq!(run_config(&["4000"]).port, 4000);
    }

    #[test]
    fn test_sweep_disabled() {
        assert_eq!(run_config(&["--sweep-interval", "0"]).sweep_interval, None);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(ServerConfig::from_args(["--help"]), Ok(Invocation::Help));
        assert_eq!(ServerConfig::from_args(["-v"]), Ok(Invocation::Version));
        assert_eq!(
            ServerConfig::from_args(["-p", "1", "--version"]),
            Ok(Invocation::Version)
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            ServerConfig::from_args(["--port"]),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            ServerConfig::from_args(["--port", "http"]),
            Err(ConfigError::InvalidValue {
                flag: "--port".to_string(),
                value: "http".to_string()
            })
        );
        assert_eq!(
            ServerConfig::from_args(["--max-frame-size", "0"]),
            Err(ConfigError::InvalidValue {
                flag: "--max-frame-size".to_string(),
                value: "0".to_string()
            })
        );
        assert_eq!(
            ServerConfig::from_args(["--verbose"]),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
        assert_eq!(
            ServerConfig::from_args(["70000"]),
            Err(ConfigError::UnknownArgument("70000".to_string()))
        );
    }
}
