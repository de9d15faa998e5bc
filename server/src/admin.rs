//! Remote administration: challenge-response authentication and the
//! `ban`/`unban` commands.
//!
//! An admin first asks for a challenge pair, then sends a command with
//! `BLAKE2b(key, personal, password ‖ challenge.hash)` computed for its
//! own password. The master recomputes the digest for every configured
//! admin and accepts the command on the first match.

use crate::config::{AdminEntry, Config};
use crate::registry::{AdminChallenge, ServerRegistry};
use blake2::digest::core_api::{Block, Buffer, UpdateCore, VariableOutputCore};
use blake2::digest::Output;
use blake2::Blake2bVarCore;
use log::info;
use protocol::{AdminCommandRequest, HostAddress, NetAddress};
use std::collections::HashSet;

/// Keyed, personalized BLAKE2b with an output of `length` bytes.
///
/// The input is the password followed by the little-endian challenge
/// nonce. `key` must be at most 64 bytes, `personal` at most 16 and
/// `length` within 1..=64; [`Config::validate`] enforces all three.
pub fn admin_digest(key: &[u8], personal: &[u8], length: usize, password: &[u8], nonce: u32) -> Vec<u8> {
    let mut core = Blake2bVarCore::new_with_params(&[], personal, key.len(), length);
    let mut buffer = Buffer::<Blake2bVarCore>::default();

    // keyed mode: the key, zero padded, is the first message block
    if !key.is_empty() {
        let mut padded_key = Block::<Blake2bVarCore>::default();
        padded_key[..key.len()].copy_from_slice(key);
        buffer.digest_blocks(&padded_key, |blocks| core.update_blocks(blocks));
    }
    buffer.digest_blocks(password, |blocks| core.update_blocks(blocks));
    buffer.digest_blocks(&nonce.to_le_bytes(), |blocks| core.update_blocks(blocks));

    let mut full = Output::<Blake2bVarCore>::default();
    core.finalize_variable_core(&mut buffer, &mut full);
    full[..length].to_vec()
}

fn digests_match(expected: &[u8], supplied: &[u8]) -> bool {
    expected.len() == supplied.len()
        && expected
            .iter()
            .zip(supplied)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// A recognised admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Ban(NetAddress),
    Unban(NetAddress),
}

impl AdminCommand {
    /// Parses `ban <address>` or `unban <address>`.
    ///
    /// Tokens are separated by spaces and runs of spaces are ignored.
    /// Any other shape, or an unparseable address, yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split(' ').filter(|token| !token.is_empty()).collect();
        match tokens.as_slice() {
            ["ban", address] => NetAddress::parse(address, 0).map(AdminCommand::Ban),
            ["unban", address] => NetAddress::parse(address, 0).map(AdminCommand::Unban),
            _ => None,
        }
    }
}

/// What happened to an admin command request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Unauthorized,
    UnknownCommand { admin: String },
    Banned { admin: String, target: NetAddress },
    Unbanned { admin: String, target: NetAddress },
}

pub struct AdminCommandHandler {
    hash_key: Vec<u8>,
    hash_personal: Vec<u8>,
    hash_length: usize,
    admins: Vec<AdminEntry>,
}

impl AdminCommandHandler {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hash_key: config.admin_hash_key.as_bytes().to_vec(),
            hash_personal: config.admin_hash_personal.as_bytes().to_vec(),
            hash_length: config.admin_hash_length,
            admins: config.admins.clone(),
        }
    }

    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    /// The digest an admin with `password` must send for `challenge`.
    pub fn expected_digest(&self, password: &str, challenge: &AdminChallenge) -> Vec<u8> {
        admin_digest(
            &self.hash_key,
            &self.hash_personal,
            self.hash_length,
            password.as_bytes(),
            challenge.hash,
        )
    }

    /// First configured admin whose digest equals `hash`.
    pub fn authenticate(&self, hash: &[u8], challenge: &AdminChallenge) -> Option<&AdminEntry> {
        self.admins
            .iter()
            .find(|admin| digests_match(&self.expected_digest(&admin.password, challenge), hash))
    }

    /// Authenticates `request` and runs its command against the ban list
    /// and registry.
    pub fn handle_request(
        &self,
        source: &NetAddress,
        request: &AdminCommandRequest,
        challenge: &AdminChallenge,
        banlist: &mut HashSet<HostAddress>,
        registry: &mut ServerRegistry,
    ) -> AdminOutcome {
        let Some(admin) = self.authenticate(&request.hash, challenge) else {
            info!(
                "Unauthorized admin command attempt from {}:{}",
                source,
                source.port()
            );
            return AdminOutcome::Unauthorized;
        };
        let name = admin.name.clone();

        match AdminCommand::parse(&request.command) {
            Some(AdminCommand::Ban(target)) => {
                banlist.insert(target.host());
                registry.ban_address(&target);
                info!("Admin {}({}) banned address {}", name, source, target);
                AdminOutcome::Banned { admin: name, target }
            }
            Some(AdminCommand::Unban(target)) => {
                banlist.remove(&target.host());
                info!("Admin {}({}) unbanned address {}", name, source, target);
                AdminOutcome::Unbanned { admin: name, target }
            }
            None => {
                info!(
                    "Admin {}({}) issued unknown command \"{}\"",
                    name, source, request.command
                );
                AdminOutcome::UnknownCommand { admin: name }
            }
        }
    }
}
