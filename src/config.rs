use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DIR: &str = "/tmp/redis-data";
pub const DEFAULT_DB_FILENAME: &str = "dump.rdb";
pub const DEFAULT_APPEND_FILENAME: &str = "database.aof";
pub const DEFAULT_APPENDFSYNC_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HANDSHAKE_DELAY_MS: u64 = 1000;

/// Server configuration. Every option can be given on the command line or through the
/// environment.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "kvdis", version, about)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "KVDIS_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// The port to listen on
    #[arg(short, long, env = "KVDIS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Run as a replica of the given master, formatted as "<host> <port>"
    #[arg(long, env = "KVDIS_REPLICAOF", value_name = "HOST PORT")]
    pub replicaof: Option<ReplicaOf>,

    /// Directory holding the append-only file
    #[arg(long, env = "KVDIS_DIR", default_value = DEFAULT_DIR)]
    pub dir: PathBuf,

    /// Snapshot file name, reported through CONFIG GET only
    #[arg(long, env = "KVDIS_DBFILENAME", default_value = DEFAULT_DB_FILENAME)]
    pub dbfilename: String,

    /// Name of the append-only file inside `dir`
    #[arg(long, env = "KVDIS_APPENDFILENAME", default_value = DEFAULT_APPEND_FILENAME)]
    pub appendfilename: String,

    /// How often the append-only file is synced to disk, in milliseconds
    #[arg(long, env = "KVDIS_APPENDFSYNC_INTERVAL_MS", default_value_t = DEFAULT_APPENDFSYNC_INTERVAL_MS)]
    pub appendfsync_interval_ms: u64,

    /// Delay before each step of the replica handshake, in milliseconds
    #[arg(long, env = "KVDIS_HANDSHAKE_DELAY_MS", default_value_t = DEFAULT_HANDSHAKE_DELAY_MS)]
    pub handshake_delay_ms: u64,

    /// Largest amount of buffered bytes accepted while decoding a single frame
    #[arg(long, env = "KVDIS_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

impl Config {
    pub fn aof_path(&self) -> PathBuf {
        self.dir.join(&self.appendfilename)
    }

    pub fn appendfsync_interval(&self) -> Duration {
        Duration::from_millis(self.appendfsync_interval_ms)
    }

    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            replicaof: None,
            dir: PathBuf::from(DEFAULT_DIR),
            dbfilename: DEFAULT_DB_FILENAME.to_string(),
            appendfilename: DEFAULT_APPEND_FILENAME.to_string(),
            appendfsync_interval_ms: DEFAULT_APPENDFSYNC_INTERVAL_MS,
            handshake_delay_ms: DEFAULT_HANDSHAKE_DELAY_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Address of the master a replica connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaOf {
    pub host: String,
    pub port: u16,
}

impl FromStr for ReplicaOf {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid master port {:?}", port))?;

                Ok(ReplicaOf {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(format!("expected \"<host> <port>\", got {:?}", s)),
        }
    }
}

impl fmt::Display for ReplicaOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["kvdis"]).unwrap();

        assert_eq!(config.port, 6379);
        assert_eq!(config.replicaof, None);
        assert_eq!(config.aof_path(), PathBuf::from("/tmp/redis-data/database.aof"));
    }

    #[test]
    fn replica_of_flag() {
        let config =
            Config::try_parse_from(["kvdis", "--port", "6380", "--replicaof", "localhost 6379"])
                .unwrap();

        assert_eq!(config.port, 6380);
        assert_eq!(
            config.replicaof,
            Some(ReplicaOf {
                host: "localhost".to_string(),
                port: 6379
            })
        );
    }

    #[test]
    fn replica_of_rejects_malformed_target() {
        assert!("localhost".parse::<ReplicaOf>().is_err());
        assert!("localhost abc".parse::<ReplicaOf>().is_err());
        assert!("localhost 6379 extra".parse::<ReplicaOf>().is_err());
        assert!(Config::try_parse_from(["kvdis", "--replicaof", "localhost"]).is_err());
    }
}
