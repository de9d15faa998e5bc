use clap::Parser;
use env_logger::Env;
use log::{error, info};
use master_server::config::Config;
use master_server::network::{MasterServer, ServerError};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Port to listen on for both address families
    #[clap(short, long, default_value = "27010")]
    port: u16,
    /// IPv4 interface address to listen on
    #[clap(long)]
    ip: Option<Ipv4Addr>,
    /// IPv6 interface address to listen on
    #[clap(long)]
    ip6: Option<Ipv6Addr>,
    /// Configuration file path
    #[clap(short = 'c', long, default_value = "config.json")]
    config_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ServerError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.ip.is_none() && args.ip6.is_none() {
        error!("No interface address given, pass --ip and/or --ip6");
        return Err("no listen address configured".into());
    }

    let config = Config::load_or_default(&args.config_file).map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!(
        "Loaded config: {} admins, quota {} per IP, server timeout {:.0}s",
        config.admins.len(),
        config.max_servers_per_ip,
        config.server_timeout_interval
    );

    let mut server = MasterServer::bind(args.port, args.ip, args.ip6, config).await?;
    server.run().await
}
