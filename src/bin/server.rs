use clap::Parser;
use scriptdis::config::Config;
use scriptdis::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    server::run(config).await
}
