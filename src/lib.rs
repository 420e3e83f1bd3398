pub mod aof;
pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod context;
pub mod frame;
pub mod replication;
pub mod server;
pub mod session;
pub mod store;
pub mod stream;
pub mod utils;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
