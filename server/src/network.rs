//! Server network layer handling UDP sockets and the event loop

use crate::config::Config;
use crate::dispatcher::{Outbound, RequestDispatcher};
use log::{debug, error, info, warn};
use protocol::{AddressFamily, NetAddress};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// Error type of the process-level plumbing.
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Largest datagram the master reads.
const RECV_BUFFER_SIZE: usize = 4096;

/// Master server bound to an IPv4 socket, an IPv6 socket, or both
pub struct MasterServer {
    socket_v4: Option<UdpSocket>,
    socket_v6: Option<UdpSocket>,
    dispatcher: RequestDispatcher,
}

impl MasterServer {
    /// Binds a socket for every address given
    ///
    /// A socket that fails to bind is logged and skipped. Fails only if no
    /// socket could be bound at all.
    pub async fn bind(
        port: u16,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
        config: Config,
    ) -> Result<Self, ServerError> {
        let socket_v4 = ipv4.and_then(|ip| bind_logged(SocketAddr::new(IpAddr::V4(ip), port)));
        let socket_v6 = ipv6.and_then(|ip| bind_logged(SocketAddr::new(IpAddr::V6(ip), port)));

        if socket_v4.is_none() && socket_v6.is_none() {
            return Err("no IPv4 or IPv6 socket could be bound".into());
        }

        Ok(Self {
            socket_v4,
            socket_v6,
            dispatcher: RequestDispatcher::new(config),
        })
    }

    pub fn local_addr_v4(&self) -> Option<SocketAddr> {
        self.socket_v4.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.socket_v6.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Main loop: one datagram or timer event at a time, until `shutdown`
    /// completes or a receive fails.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            socket_v4,
            socket_v6,
            dispatcher,
        } = self;

        let mut cleanup_timer = interval(dispatcher.config().cleanup_interval());
        cleanup_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rate_timer = interval(dispatcher.config().rate_limit_interval());
        rate_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first ticks since they fire immediately
        cleanup_timer.tick().await;
        rate_timer.tick().await;

        let mut buffer_v4 = vec![0u8; RECV_BUFFER_SIZE];
        let mut buffer_v6 = vec![0u8; RECV_BUFFER_SIZE];
        tokio::pin!(shutdown);

        info!("Master server started");

        loop {
            tokio::select! {
                result = recv_from(socket_v4.as_ref(), &mut buffer_v4) => {
                    let (len, addr) = result?;
                    let outbound = dispatcher.handle_packet(&buffer_v4[..len], &NetAddress::from(addr));
                    send_all(socket_v4.as_ref(), socket_v6.as_ref(), &outbound).await;
                },
                result = recv_from(socket_v6.as_ref(), &mut buffer_v6) => {
                    let (len, addr) = result?;
                    let outbound = dispatcher.handle_packet(&buffer_v6[..len], &NetAddress::from(addr));
                    send_all(socket_v4.as_ref(), socket_v6.as_ref(), &outbound).await;
                },
                _ = cleanup_timer.tick() => {
                    let removed = dispatcher.registry_mut().update_state();
                    debug!(
                        "Registry sweep: {} removed, {} servers listed",
                        removed.len(),
                        dispatcher.registry().len()
                    );
                },
                _ = rate_timer.tick() => {
                    dispatcher.update_state();
                },
                _ = &mut shutdown => {
                    info!("Master server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn bind_logged(addr: SocketAddr) -> Option<UdpSocket> {
    match bind_udp(addr) {
        Ok(socket) => {
            info!("Listening on {}", addr);
            Some(socket)
        }
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            None
        }
    }
}

fn bind_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        // keep the IPv6 socket from also claiming the IPv4 port
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

async fn recv_from(socket: Option<&UdpSocket>, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buffer).await,
        None => std::future::pending().await,
    }
}

async fn send_all(socket_v4: Option<&UdpSocket>, socket_v6: Option<&UdpSocket>, outbound: &[Outbound]) {
    for packet in outbound {
        let socket = match packet.addr.family() {
            AddressFamily::IPv4 => socket_v4,
            AddressFamily::IPv6 => socket_v6,
        };
        let Some(socket) = socket else {
            debug!("No socket for {}, dropping reply", packet.addr);
            continue;
        };
        if let Err(e) = socket.send_to(&packet.data, packet.addr.to_socket_addr()).await {
            warn!(
                "Failed to send to {}:{}: {}",
                packet.addr,
                packet.addr.port(),
                e
            );
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
