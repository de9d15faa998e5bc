use clap::Parser;
use protocol::{
    AddressFamily, BinaryWriter, ClientQueryRequest, ClientQueryResponse, FakeServerInfo,
    Infostring,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Asks a master server for its server list and prints it.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Master server address
    #[clap(short, long, default_value = "127.0.0.1:27010")]
    master: SocketAddr,
    /// Game directory to list servers for
    #[clap(short, long, default_value = "valve")]
    gamedir: String,
    /// Client version to report
    #[clap(long, default_value = "0.21")]
    clver: String,
    /// Send no client version, as very old clients do
    #[clap(long)]
    no_clver: bool,
    /// Only list NAT-bypass servers
    #[clap(long)]
    nat: bool,
    /// Query key echoed back by the master
    #[clap(long, value_parser = parse_hex)]
    key: Option<u32>,
    /// Protocol version filter
    #[clap(long)]
    protocol: Option<u32>,
    /// Seconds to wait for replies
    #[clap(short, long, default_value = "2")]
    wait: u64,
}

fn parse_hex(text: &str) -> Result<u32, String> {
    u32::from_str_radix(text, 16).map_err(|e| e.to_string())
}

fn build_query(args: &Args) -> Vec<u8> {
    let mut info = Infostring::new();
    info.insert("gamedir", args.gamedir.as_str());
    info.insert("nat", if args.nat { "1" } else { "0" });
    if !args.no_clver {
        info.insert("clver", args.clver.as_str());
    }
    if let Some(key) = args.key {
        info.insert("key", format!("{key:08x}"));
    }
    if let Some(protocol) = args.protocol {
        info.insert("protocol", protocol.to_string());
    }

    let mut writer = BinaryWriter::growable();
    writer.write_bytes(ClientQueryRequest::HEADER);
    writer.write(0xFFu8);
    writer.write_cstring("0.0.0.0:0", true);
    writer.write_cstring(&info.to_string(), true);
    writer.into_inner()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let bind_addr = if args.master.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    println!("Querying {} for gamedir {}", args.master, args.gamedir);
    socket.send_to(&build_query(&args), args.master).await?;

    let family = if args.master.is_ipv6() {
        AddressFamily::IPv6
    } else {
        AddressFamily::IPv4
    };

    // Outdated clients get several fake-server packets, so keep reading
    // until the master goes quiet.
    let mut buffer = [0u8; 4096];
    while let Ok(result) = timeout(Duration::from_secs(args.wait), socket.recv_from(&mut buffer)).await {
        let (len, from) = result?;
        let data = &buffer[..len];

        if let Some(list) = ClientQueryResponse::parse(data, family, args.key.is_some()) {
            if let Some(key) = list.query_key {
                println!("Query key: {key:08x}");
            }
            println!("{} servers:", list.servers.len());
            for server in &list.servers {
                println!("  {}", server.to_socket_addr());
            }
        } else if let Some(info) = FakeServerInfo::parse(data) {
            println!("Message: {}", info.get("host").unwrap_or_default());
        } else {
            println!("Unrecognized {} byte reply from {}", len, from);
        }
    }
    Ok(())
}
