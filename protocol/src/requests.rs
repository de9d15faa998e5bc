//! Typed decoders for inbound datagrams.
//!
//! Each parser takes the whole datagram (header included) and returns
//! `None` on any malformed input. A `None` never carries partial state.

use crate::binary::BinaryReader;
use crate::infostring::{Infostring, DELIMITER};
use log::debug;

/// Client asking for the server list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientQueryRequest {
    pub gamedir: String,
    pub nat_bypass: bool,
    pub query_key: Option<u32>,
    pub protocol_version: Option<u32>,
    pub client_version: Option<String>,
}

impl ClientQueryRequest {
    pub const HEADER: &'static [u8] = b"1";

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = BinaryReader::new(data);

        // message type and region code
        if !reader.skip_bytes(2) || reader.end_of_file() {
            return None;
        }
        // historically the last server address seen by the client; unused
        if !reader.skip_string() {
            return None;
        }

        let text = reader.read_string();
        if !text.contains(DELIMITER) {
            return None;
        }

        let info = Infostring::parse(&text);
        let gamedir = info.get("gamedir")?.to_string();
        let nat = info.get("nat")?;

        let query_key = match info.get("key") {
            Some(key) => match u32::from_str_radix(key, 16) {
                Ok(value) => Some(value),
                Err(_) => {
                    debug!("Client query with malformed key \"{}\"", key);
                    return None;
                }
            },
            None => None,
        };

        let protocol_version = match info.get("protocol") {
            Some(protocol) => Some(protocol.parse::<u32>().ok()?),
            None => None,
        };

        Some(Self {
            gamedir,
            nat_bypass: nat != "0",
            query_key,
            protocol_version,
            client_version: info.get("clver").map(str::to_string),
        })
    }
}

/// Game server asking for a registration challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerChallengeRequest {
    pub client_challenge: Option<u32>,
}

impl ServerChallengeRequest {
    pub const HEADER: &'static [u8] = b"q\xff";
    const WITH_ECHO_LEN: usize = 6;

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = BinaryReader::new(data);
        if !reader.skip_bytes(Self::HEADER.len()) {
            return None;
        }

        let client_challenge = if data.len() == Self::WITH_ECHO_LEN {
            Some(reader.try_read::<u32>()?)
        } else {
            None
        };
        Some(Self { client_challenge })
    }
}

/// Game server registration or heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAppendRequest {
    pub challenge: u32,
    pub info: Infostring,
}

impl ServerAppendRequest {
    pub const HEADER: &'static [u8] = b"0\n";

    /// Every key a registration must carry.
    pub const REQUIRED_KEYS: [&'static str; 16] = [
        "challenge", "protocol", "players", "max", "bots", "region", "gamedir", "map",
        "version", "os", "product", "type", "password", "secure", "lan", "nat",
    ];

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = BinaryReader::new(data);
        if !reader.skip_bytes(Self::HEADER.len()) || reader.end_of_file() {
            return None;
        }

        // not NUL-terminated, runs to the end of the datagram
        let info = Infostring::parse(&reader.read_string());
        if let Some(missing) = Self::REQUIRED_KEYS.iter().find(|key| !info.contains(key)) {
            debug!("Server append request without \"{}\" key", missing);
            return None;
        }

        let challenge = info.get("challenge")?.trim().parse::<u32>().ok()?;
        Some(Self { challenge, info })
    }
}

/// Request for an admin challenge pair. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminChallengeRequest;

impl AdminChallengeRequest {
    pub const HEADER: &'static [u8] = b"adminchallenge";
}

/// Authenticated admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCommandRequest {
    pub master_challenge: u32,
    pub hash: Vec<u8>,
    pub command: String,
}

impl AdminCommandRequest {
    pub const HEADER: &'static [u8] = b"admin";

    pub fn parse(data: &[u8], hash_length: usize) -> Option<Self> {
        let mut reader = BinaryReader::new(data);
        reader.skip_bytes(Self::HEADER.len());
        let master_challenge = reader.read::<u32>();
        let hash = reader.read_bytes(hash_length).unwrap_or_default().to_vec();
        if reader.underflowed() {
            return None;
        }

        Some(Self {
            master_challenge,
            hash,
            command: reader.read_string(),
        })
    }
}
