//! State kept for one registered game server.

use crate::timer::Timer;
use protocol::{Infostring, NetAddress};
use std::time::Duration;

/// A game server that completed the challenge handshake.
///
/// Gameplay fields are overwritten wholesale by every accepted heartbeat,
/// which also resets the liveness timer.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    /// Address+port the server registered from
    pub address: NetAddress,
    pub protocol: u32,
    pub players: u32,
    pub max_players: u32,
    pub bots: u32,
    pub region: u32,
    pub gamedir: String,
    pub map: String,
    pub version: String,
    pub os: String,
    pub product: String,
    pub dedicated: bool,
    pub password: bool,
    pub secure: bool,
    pub lan: bool,
    pub nat_bypass: bool,
    keepalive: Timer,
}

impl ServerEntry {
    pub fn new(address: NetAddress) -> Self {
        Self {
            address,
            protocol: 0,
            players: 0,
            max_players: 0,
            bots: 0,
            region: 0,
            gamedir: String::new(),
            map: String::new(),
            version: String::new(),
            os: String::new(),
            product: String::new(),
            dedicated: false,
            password: false,
            secure: false,
            lan: false,
            nat_bypass: false,
            keepalive: Timer::new(),
        }
    }

    /// Copies every gameplay field out of a registration infostring.
    ///
    /// Numbers are read from their leading digits; anything unparseable
    /// becomes 0. Flags are set for any value other than `"0"`, except
    /// `type` which marks a dedicated server only when it is `"d"`.
    pub fn update(&mut self, info: &Infostring) {
        let text = |key: &str| info.get(key).unwrap_or_default().to_string();
        let number = |key: &str| leading_number(info.get(key).unwrap_or_default());
        let flag = |key: &str| info.get(key).is_some_and(|value| value != "0");

        self.protocol = number("protocol");
        self.players = number("players");
        self.max_players = number("max");
        self.bots = number("bots");
        self.region = number("region");

        self.gamedir = text("gamedir");
        self.map = text("map");
        self.version = text("version");
        self.os = text("os");
        self.product = text("product");

        self.dedicated = info.get("type") == Some("d");
        self.password = flag("password");
        self.secure = flag("secure");
        self.lan = flag("lan");
        self.nat_bypass = flag("nat");
    }

    pub fn reset_timeout(&mut self) {
        self.keepalive.reset();
    }

    /// True when no heartbeat arrived within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.keepalive.interval_elapsed(timeout)
    }
}

fn leading_number(text: &str) -> u32 {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> NetAddress {
        NetAddress::parse("10.0.0.5", 27015).unwrap()
    }

    fn heartbeat() -> Infostring {
        Infostring::parse(
            "\\protocol\\49\\challenge\\1\\players\\3\\max\\16\\bots\\1\\gamedir\\valve\
             \\map\\crossfire\\type\\d\\password\\0\\os\\l\\secure\\1\\lan\\0\
             \\version\\0.21.1\\region\\255\\product\\valve\\nat\\0",
        )
    }

    #[test]
    fn test_entry_creation() {
        let entry = ServerEntry::new(test_addr());
        assert_eq!(entry.address, test_addr());
        assert_eq!(entry.players, 0);
        assert!(entry.gamedir.is_empty());
        assert!(!entry.dedicated);
    }

    #[test]
    fn test_update_fields() {
        let mut entry = ServerEntry::new(test_addr());
        entry.update(&heartbeat());

        assert_eq!(entry.protocol, 49);
        assert_eq!(entry.players, 3);
        assert_eq!(entry.max_players, 16);
        assert_eq!(entry.bots, 1);
        assert_eq!(entry.region, 255);
        assert_eq!(entry.gamedir, "valve");
        assert_eq!(entry.map, "crossfire");
        assert_eq!(entry.version, "0.21.1");
        assert_eq!(entry.os, "l");
        assert_eq!(entry.product, "valve");
        assert!(entry.dedicated);
        assert!(!entry.password);
        assert!(entry.secure);
        assert!(!entry.lan);
        assert!(!entry.nat_bypass);
    }

    #[test]
    fn test_update_overwrites_previous_values() {
        let mut entry = ServerEntry::new(test_addr());
        entry.update(&heartbeat());

        let mut info = heartbeat();
        info.insert("map", "stalkyard");
        info.insert("type", "l");
        info.insert("nat", "1");
        info.insert("players", "junk");
        entry.update(&info);

        assert_eq!(entry.map, "stalkyard");
        assert!(!entry.dedicated);
        assert!(entry.nat_bypass);
        assert_eq!(entry.players, 0);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("42"), 42);
        assert_eq!(leading_number(" 7 players"), 7);
        assert_eq!(leading_number("x1"), 0);
        assert_eq!(leading_number(""), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_timeout() {
        let mut entry = ServerEntry::new(test_addr());
        let timeout = Duration::from_secs(360);
        assert!(!entry.is_timed_out(timeout));

        tokio::time::advance(Duration::from_secs(300)).await;
        entry.reset_timeout();
        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(!entry.is_timed_out(timeout));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(entry.is_timed_out(timeout));
    }
}
