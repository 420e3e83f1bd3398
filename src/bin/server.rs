use clap::Parser;
use kvdis::config::Config;
use kvdis::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    server::run(config).await
}
