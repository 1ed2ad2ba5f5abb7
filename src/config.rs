use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

use crate::buffer::DEFAULT_CAPACITY;
use crate::reader::{Limits, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH};

pub const PORT: u16 = 6379;

/// Server settings, read from command line flags with environment variable fallbacks.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "respd", version, about = "A Redis-compatible RESP2/RESP3 server")]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "RESPD_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// The port to listen on
    #[arg(short, long, env = "RESPD_PORT", default_value_t = PORT)]
    pub port: u16,

    /// Capacity in bytes of the read and the write buffer of every connection
    #[arg(long, env = "RESPD_BUFFER_CAPACITY", default_value_t = DEFAULT_CAPACITY, value_parser = parse_capacity)]
    pub buffer_capacity: usize,

    /// How many aggregate levels an incoming frame may nest
    #[arg(long, env = "RESPD_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Maximum length in bytes of a single bulk payload or simple line
    #[arg(long, env = "RESPD_MAX_BULK_LEN", default_value_t = DEFAULT_MAX_BULK_LEN)]
    pub max_bulk_len: usize,
}

impl Config {
    pub fn limits(&self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            max_bulk_len: self.max_bulk_len,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: PORT,
            buffer_capacity: DEFAULT_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
        }
    }
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err(String::from("buffer capacity must be at least 1 byte")),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Config::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "respd",
            "--host",
            "127.0.0.1",
            "--port",
            "7000",
            "--buffer-capacity",
            "64",
            "--max-depth",
            "8",
        ])
        .unwrap();

        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 7000);
        assert_eq!(config.buffer_capacity, 64);
        assert_eq!(
            config.limits(),
            Limits {
                max_depth: 8,
                max_bulk_len: DEFAULT_MAX_BULK_LEN,
            }
        );
    }

    #[test]
    fn zero_buffer_capacity_is_rejected() {
        assert!(Config::try_parse_from(["respd", "--buffer-capacity", "0"]).is_err());
    }
}
