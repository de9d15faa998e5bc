//! Registry of live game servers and their pending challenges
//!
//! This module owns every piece of per-server state the master keeps:
//! - Registered server entries keyed by address+port
//! - Per-IP registration counts used to enforce the quota
//! - Outstanding registration challenges
//! - Outstanding admin challenge pairs
//!
//! All four tables expire on their own schedule. `update_state` is called
//! from the cleanup timer and sweeps each of them.

use crate::config::Config;
use crate::server_entry::ServerEntry;
use crate::timer::Expirable;
use log::info;
use protocol::{HostAddress, NetAddress};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

/// Nonce pair issued to an admin before it may send a command.
///
/// `master` is echoed back in the clear; `hash` is mixed into the
/// password digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminChallenge {
    pub master: u32,
    pub hash: u32,
}

impl AdminChallenge {
    fn random() -> Self {
        Self {
            master: OsRng.next_u32(),
            hash: OsRng.next_u32(),
        }
    }
}

/// Tracks registered servers and the handshakes that lead to registration
///
/// Challenges are only handed out and validated here; whether a request
/// is allowed to ask for one is decided by the dispatcher.
pub struct ServerRegistry {
    servers: HashMap<NetAddress, ServerEntry>,
    server_counts: HashMap<HostAddress, usize>,
    challenges: HashMap<NetAddress, Expirable<u32>>,
    admin_challenges: HashMap<NetAddress, Expirable<AdminChallenge>>,
    server_timeout: Duration,
    challenge_timeout: Duration,
}

impl ServerRegistry {
    pub fn new(server_timeout: Duration, challenge_timeout: Duration) -> Self {
        Self {
            servers: HashMap::new(),
            server_counts: HashMap::new(),
            challenges: HashMap::new(),
            admin_challenges: HashMap::new(),
            server_timeout,
            challenge_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_timeout(), config.challenge_timeout())
    }

    /// Returns the entry for `address`, creating it if needed
    ///
    /// Creating an entry bumps the per-IP count for its host. Callers are
    /// expected to have validated a challenge first.
    pub fn insert(&mut self, address: NetAddress) -> &mut ServerEntry {
        match self.servers.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                *self.server_counts.entry(address.host()).or_insert(0) += 1;
                entry.insert(ServerEntry::new(address))
            }
        }
    }

    pub fn contains(&self, address: &NetAddress) -> bool {
        self.servers.contains_key(address)
    }

    pub fn get(&self, address: &NetAddress) -> Option<&ServerEntry> {
        self.servers.get(address)
    }

    /// Removes one server and releases its slot in the per-IP count.
    pub fn remove(&mut self, address: &NetAddress) -> Option<ServerEntry> {
        let entry = self.servers.remove(address)?;
        if let Entry::Occupied(mut count) = self.server_counts.entry(address.host()) {
            let remaining = count.get().saturating_sub(1);
            if remaining == 0 {
                count.remove();
            } else {
                *count.get_mut() = remaining;
            }
        }
        Some(entry)
    }

    /// Number of servers registered from the IP of `address`, any port.
    pub fn count_for_address(&self, address: &NetAddress) -> usize {
        self.server_counts
            .get(&address.host())
            .copied()
            .unwrap_or(0)
    }

    /// Live challenge for `address`, minting a fresh one if none exists.
    pub fn generate_challenge(&mut self, address: &NetAddress) -> u32 {
        if let Some(challenge) = self.live_challenge(address) {
            return challenge;
        }
        let challenge = OsRng.next_u32();
        self.challenges.insert(*address, Expirable::new(challenge));
        challenge
    }

    pub fn check_for_challenge(&self, address: &NetAddress) -> bool {
        self.live_challenge(address).is_some()
    }

    pub fn validate_challenge(&self, address: &NetAddress, challenge: u32) -> bool {
        self.live_challenge(address) == Some(challenge)
    }

    fn live_challenge(&self, address: &NetAddress) -> Option<u32> {
        self.challenges
            .get(address)
            .filter(|challenge| !challenge.expired(self.challenge_timeout))
            .map(|challenge| *challenge.value())
    }

    /// Live admin challenge for `address`, minting a fresh pair if none exists.
    pub fn admin_challenge(&mut self, address: &NetAddress) -> AdminChallenge {
        if let Some(challenge) = self.live_admin_challenge(address) {
            return challenge;
        }
        let challenge = AdminChallenge::random();
        self.admin_challenges
            .insert(*address, Expirable::new(challenge));
        challenge
    }

    pub fn check_admin_challenge(&self, address: &NetAddress) -> bool {
        self.live_admin_challenge(address).is_some()
    }

    pub fn live_admin_challenge(&self, address: &NetAddress) -> Option<AdminChallenge> {
        self.admin_challenges
            .get(address)
            .filter(|challenge| !challenge.expired(self.challenge_timeout))
            .map(|challenge| *challenge.value())
    }

    /// Forgets the admin challenge of `address` once a command has used it.
    pub fn remove_admin_challenge(&mut self, address: &NetAddress) -> Option<AdminChallenge> {
        self.admin_challenges
            .remove(address)
            .map(|challenge| *challenge.value())
    }

    /// Drops every server registered from the IP of `address`, any port.
    ///
    /// Returns how many entries were removed.
    pub fn ban_address(&mut self, address: &NetAddress) -> usize {
        let host = address.host();
        let banned: Vec<NetAddress> = self
            .servers
            .keys()
            .filter(|server| server.host() == host)
            .copied()
            .collect();

        for server in &banned {
            self.remove(server);
        }
        banned.len()
    }

    /// Sweeps timed-out servers and expired challenges
    ///
    /// Returns the addresses of the servers that were dropped.
    pub fn update_state(&mut self) -> Vec<NetAddress> {
        let timed_out: Vec<NetAddress> = self
            .servers
            .values()
            .filter(|entry| entry.is_timed_out(self.server_timeout))
            .map(|entry| entry.address)
            .collect();

        for address in &timed_out {
            self.remove(address);
            info!("Server {}:{} timed out", address, address.port());
        }

        let challenge_timeout = self.challenge_timeout;
        self.challenges
            .retain(|_, challenge| !challenge.expired(challenge_timeout));
        self.admin_challenges
            .retain(|_, challenge| !challenge.expired(challenge_timeout));

        timed_out
    }

    pub fn entries(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    pub fn admin_challenge_count(&self) -> usize {
        self.admin_challenges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> NetAddress {
        NetAddress::parse("192.0.2.10", 27015).unwrap()
    }

    fn test_addr2() -> NetAddress {
        NetAddress::parse("192.0.2.10", 27016).unwrap()
    }

    fn test_registry() -> ServerRegistry {
        ServerRegistry::new(Duration::from_secs(360), Duration::from_secs(15))
    }

    #[test]
    fn test_registry_creation() {
        let registry = test_registry();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.count_for_address(&test_addr()), 0);
    }

    #[test]
    fn test_insert_counts_per_ip() {
        let mut registry = test_registry();
        registry.insert(test_addr());
        registry.insert(test_addr2());
        // second insert for the same address+port is an update
        registry.insert(test_addr());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.count_for_address(&test_addr()), 2);
        assert_eq!(registry.count_for_address(&test_addr().with_port(1)), 2);
        assert!(registry.contains(&test_addr()));
        assert!(!registry.contains(&test_addr().with_port(1)));
    }

    #[test]
    fn test_remove_releases_count() {
        let mut registry = test_registry();
        registry.insert(test_addr());
        registry.insert(test_addr2());

        assert!(registry.remove(&test_addr()).is_some());
        assert_eq!(registry.count_for_address(&test_addr()), 1);
        assert!(registry.remove(&test_addr()).is_none());
        assert_eq!(registry.count_for_address(&test_addr()), 1);

        registry.remove(&test_addr2());
        assert_eq!(registry.count_for_address(&test_addr()), 0);
        assert!(registry.server_counts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_lifecycle() {
        let mut registry = test_registry();
        let addr = test_addr();
        assert!(!registry.check_for_challenge(&addr));

        let challenge = registry.generate_challenge(&addr);
        assert!(registry.check_for_challenge(&addr));
        assert!(registry.validate_challenge(&addr, challenge));
        assert!(!registry.validate_challenge(&addr, challenge.wrapping_add(1)));
        assert!(!registry.validate_challenge(&test_addr2(), challenge));

        // within the window the same value is returned
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(registry.generate_challenge(&addr), challenge);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!registry.check_for_challenge(&addr));
        assert!(!registry.validate_challenge(&addr, challenge));
        let fresh = registry.generate_challenge(&addr);
        assert!(registry.validate_challenge(&addr, fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_challenge_is_stable_within_window() {
        let mut registry = test_registry();
        let addr = test_addr();
        assert!(!registry.check_admin_challenge(&addr));

        let first = registry.admin_challenge(&addr);
        assert_eq!(registry.admin_challenge(&addr), first);
        assert_eq!(registry.live_admin_challenge(&addr), Some(first));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(!registry.check_admin_challenge(&addr));
        registry.update_state();
        assert_eq!(registry.admin_challenge_count(), 0);
    }

    #[test]
    fn test_remove_admin_challenge() {
        let mut registry = test_registry();
        let addr = test_addr();

        let first = registry.admin_challenge(&addr);
        assert_eq!(registry.remove_admin_challenge(&addr), Some(first));
        assert!(!registry.check_admin_challenge(&addr));
        assert_eq!(registry.remove_admin_challenge(&addr), None);
    }

    #[test]
    fn test_ban_address_removes_all_ports() {
        let mut registry = test_registry();
        let other = NetAddress::parse("198.51.100.1", 27015).unwrap();
        registry.insert(test_addr());
        registry.insert(test_addr2());
        registry.insert(other);

        assert_eq!(registry.ban_address(&test_addr().with_port(0)), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&other));
        assert_eq!(registry.count_for_address(&test_addr()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_state_sweeps_stale_servers() {
        let mut registry = test_registry();
        registry.insert(test_addr());
        registry.insert(test_addr2());
        registry.generate_challenge(&test_addr());

        tokio::time::advance(Duration::from_secs(200)).await;
        registry.insert(test_addr2()).reset_timeout();
        assert_eq!(registry.challenge_count(), 1);
        assert!(registry.update_state().is_empty());
        assert_eq!(registry.challenge_count(), 0);

        tokio::time::advance(Duration::from_secs(161)).await;
        let removed = registry.update_state();
        assert_eq!(removed, vec![test_addr()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.count_for_address(&test_addr()), 1);
        assert!(registry.entries().all(|entry| entry.address == test_addr2()));

        tokio::time::advance(Duration::from_secs(200)).await;
        registry.update_state();
        assert!(registry.is_empty());
        assert!(registry.server_counts.is_empty());
    }
}
