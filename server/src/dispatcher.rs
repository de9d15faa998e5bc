//! Inbound datagram dispatch
//!
//! Every datagram goes through the same pipeline:
//! - drop it if the source is banned or rate-limited
//! - count it against the source's packet budget for the current window
//! - match its header against the dispatch table
//! - parse it and run the matching handler
//!
//! Handlers never touch a socket. They return the datagrams to send as
//! [`Outbound`] values and the event loop writes them out.

use crate::admin::{AdminCommandHandler, AdminOutcome};
use crate::config::Config;
use crate::query::ServerListQuery;
use crate::registry::ServerRegistry;
use crate::timer::Expirable;
use log::{debug, info, warn};
use protocol::{
    AdminChallengeRequest, AdminChallengeResponse, AdminCommandRequest, BinaryWriter,
    ClientQueryRequest, FakeServerInfo, HostAddress, NatAnnounce, NetAddress,
    ServerAppendRequest, ServerChallengeRequest, ServerChallengeResponse, VersionInfo,
};
use std::collections::{HashMap, HashSet};

/// Shown line by line as fake servers in an outdated client's browser.
pub const UPGRADE_NOTICE: [&str; 8] = [
    "This version is not",
    "supported anymore",
    "Please update Xash3DFWGS",
    "From GooglePlay or GitHub",
    "Эта версия",
    "устарела",
    "Обновите Xash3DFWGS c",
    "GooglePlay или GitHub",
];

/// Shortest datagram worth looking at.
const MIN_PACKET_LEN: usize = 2;

/// A datagram the event loop must send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub addr: NetAddress,
    pub data: Vec<u8>,
}

impl Outbound {
    fn encode(addr: NetAddress, serialize: impl FnOnce(&mut BinaryWriter<Vec<u8>>) -> bool) -> Option<Self> {
        let mut writer = BinaryWriter::growable();
        serialize(&mut writer).then(|| Outbound {
            addr,
            data: writer.into_inner(),
        })
    }
}

type Handler = fn(&mut RequestDispatcher, &[u8], &NetAddress, &mut Vec<Outbound>);

/// Header prefixes in match order. `adminchallenge` must come before
/// `admin`, which is its prefix.
static DISPATCH_TABLE: [(&[u8], Handler); 5] = [
    (ClientQueryRequest::HEADER, RequestDispatcher::handle_client_query as Handler),
    (ServerChallengeRequest::HEADER, RequestDispatcher::handle_challenge_request as Handler),
    (ServerAppendRequest::HEADER, RequestDispatcher::handle_append_request as Handler),
    (AdminChallengeRequest::HEADER, RequestDispatcher::handle_admin_challenge as Handler),
    (AdminCommandRequest::HEADER, RequestDispatcher::handle_admin_command as Handler),
];

/// Routes datagrams to handlers and owns all master state.
pub struct RequestDispatcher {
    config: Config,
    registry: ServerRegistry,
    admin: AdminCommandHandler,
    banlist: HashSet<HostAddress>,
    rate_limit_bans: HashMap<HostAddress, Expirable<()>>,
    packet_counts: HashMap<HostAddress, u32>,
}

impl RequestDispatcher {
    pub fn new(config: Config) -> Self {
        Self {
            registry: ServerRegistry::from_config(&config),
            admin: AdminCommandHandler::from_config(&config),
            banlist: HashSet::new(),
            rate_limit_bans: HashMap::new(),
            packet_counts: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ServerRegistry {
        &mut self.registry
    }

    pub fn is_banned(&self, address: &NetAddress) -> bool {
        self.banlist.contains(&address.host())
    }

    pub fn is_rate_limited(&self, address: &NetAddress) -> bool {
        self.rate_limit_bans
            .get(&address.host())
            .is_some_and(|ban| !ban.expired(self.config.rate_limit_ban_time()))
    }

    /// Processes one datagram and returns the datagrams to send in reply.
    pub fn handle_packet(&mut self, data: &[u8], source: &NetAddress) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        if self.is_banned(source) || self.is_rate_limited(source) {
            return outbound;
        }

        let host = source.host();
        let count = self.packet_counts.entry(host).or_insert(0);
        *count += 1;
        if *count > self.config.packet_rate_limit {
            self.packet_counts.remove(&host);
            self.rate_limit_bans.insert(host, Expirable::new(()));
            warn!(
                "Address {} banned due to exceeding packet rate limit",
                source
            );
            return outbound;
        }

        if data.len() < MIN_PACKET_LEN {
            return outbound;
        }

        match DISPATCH_TABLE
            .iter()
            .find(|(header, _)| data.starts_with(header))
        {
            Some((_, handler)) => handler(self, data, source, &mut outbound),
            None => debug!(
                "Unknown packet from {}:{} ({} bytes)",
                source,
                source.port(),
                data.len()
            ),
        }
        outbound
    }

    /// Starts a new rate window and lifts expired rate-limit bans.
    pub fn update_state(&mut self) {
        self.packet_counts.clear();
        let ban_time = self.config.rate_limit_ban_time();
        self.rate_limit_bans.retain(|_, ban| !ban.expired(ban_time));
    }

    fn client_outdated(&self, request: &ClientQueryRequest) -> bool {
        match request.client_version.as_deref() {
            None => true,
            Some(text) => {
                VersionInfo::parse(text).is_some_and(|version| version < self.config.client_min_version)
            }
        }
    }

    fn handle_client_query(&mut self, data: &[u8], source: &NetAddress, outbound: &mut Vec<Outbound>) {
        let Some(request) = ClientQueryRequest::parse(data) else {
            debug!("Malformed client query from {}:{}", source, source.port());
            return;
        };

        if self.client_outdated(&request) {
            outbound.extend(UPGRADE_NOTICE.iter().filter_map(|line| {
                let info = FakeServerInfo::new(*line, request.gamedir.as_str());
                Outbound::encode(*source, |writer| info.serialize(writer))
            }));
        } else {
            let list = ServerListQuery::from_request(*source, &request).build(self.registry.entries());
            outbound.extend(Outbound::encode(*source, |writer| list.response.serialize(writer)));

            let announce = NatAnnounce { client: *source };
            outbound.extend(
                list.nat_announced
                    .iter()
                    .filter_map(|server| Outbound::encode(*server, |writer| announce.serialize(writer))),
            );
        }

        info!(
            "Client query: {}:{}, gamedir={}, clver={}, nat={}",
            source,
            source.port(),
            request.gamedir,
            request.client_version.as_deref().unwrap_or("unknown"),
            u8::from(request.nat_bypass)
        );
    }

    fn handle_challenge_request(&mut self, data: &[u8], source: &NetAddress, outbound: &mut Vec<Outbound>) {
        // registered servers keep refreshing even when their IP is at quota
        if !self.registry.contains(source)
            && self.registry.count_for_address(source) >= self.config.max_servers_per_ip
        {
            debug!(
                "Challenge request from {}:{} over the per-IP quota",
                source,
                source.port()
            );
            return;
        }
        if self.registry.check_for_challenge(source) {
            debug!(
                "Challenge request from {}:{} while one is pending",
                source,
                source.port()
            );
            return;
        }
        let Some(request) = ServerChallengeRequest::parse(data) else {
            return;
        };

        let response = ServerChallengeResponse {
            challenge: self.registry.generate_challenge(source),
            client_challenge: request.client_challenge,
        };
        outbound.extend(Outbound::encode(*source, |writer| response.serialize(writer)));
    }

    fn handle_append_request(&mut self, data: &[u8], source: &NetAddress, _outbound: &mut Vec<Outbound>) {
        if !self.registry.check_for_challenge(source) {
            info!("Server skipped challenge request: {}:{}", source, source.port());
            return;
        }
        let Some(request) = ServerAppendRequest::parse(data) else {
            debug!("Malformed server append from {}:{}", source, source.port());
            return;
        };
        if !self.registry.validate_challenge(source, request.challenge) {
            info!(
                "Incorrect challenge from {}:{}: value {}",
                source,
                source.port(),
                request.challenge
            );
            return;
        }

        let version = request.info.get("version").unwrap_or_default();
        if !VersionInfo::parse(version).is_some_and(|v| v >= self.config.server_min_version) {
            info!(
                "Rejected server {}:{} with outdated version \"{}\"",
                source,
                source.port(),
                version
            );
            return;
        }

        let exists = self.registry.contains(source);
        if !exists && self.registry.count_for_address(source) >= self.config.max_servers_per_ip {
            info!(
                "Rejected server {}:{}, per-IP quota of {} reached",
                source,
                source.port(),
                self.config.max_servers_per_ip
            );
            return;
        }
        let server = self.registry.insert(*source);
        server.update(&request.info);
        server.reset_timeout();

        info!(
            "{} server: {}:{}, game={}/{}, protocol={}, players={}/{}/{}, version={}",
            if exists { "Updated" } else { "Added" },
            source,
            source.port(),
            server.map,
            server.gamedir,
            server.protocol,
            server.players,
            server.bots,
            server.max_players,
            server.version
        );
    }

    fn handle_admin_challenge(&mut self, _data: &[u8], source: &NetAddress, outbound: &mut Vec<Outbound>) {
        let challenge = self.registry.admin_challenge(source);
        let response = AdminChallengeResponse {
            master: challenge.master,
            hash: challenge.hash,
        };
        outbound.extend(Outbound::encode(*source, |writer| response.serialize(writer)));
    }

    fn handle_admin_command(&mut self, data: &[u8], source: &NetAddress, _outbound: &mut Vec<Outbound>) {
        let Some(challenge) = self.registry.live_admin_challenge(source) else {
            debug!(
                "Admin command from {}:{} without a challenge",
                source,
                source.port()
            );
            return;
        };
        let Some(request) = AdminCommandRequest::parse(data, self.admin.hash_length()) else {
            debug!("Malformed admin command from {}:{}", source, source.port());
            return;
        };
        if request.master_challenge != challenge.master {
            info!("Incorrect admin challenge from {}:{}", source, source.port());
            return;
        }

        let outcome = self.admin.handle_request(
            source,
            &request,
            &challenge,
            &mut self.banlist,
            &mut self.registry,
        );
        // one command per challenge
        if outcome != AdminOutcome::Unauthorized {
            self.registry.remove_admin_challenge(source);
        }
    }
}
