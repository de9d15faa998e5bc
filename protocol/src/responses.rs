//! Outbound packet encoders, plus a decoder for the server list so that
//! clients and tests can read what the master sends.

use crate::address::{AddressFamily, NetAddress};
use crate::binary::{BinaryReader, BinaryWriter, ByteSink};
use crate::infostring::Infostring;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Server list sent in reply to a client query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientQueryResponse {
    pub query_key: Option<u32>,
    pub servers: Vec<NetAddress>,
}

impl ClientQueryResponse {
    pub const HEADER: &'static [u8] = b"\xff\xff\xff\xfff\n";
    const KEY_MARKER: u8 = 0x7F;
    const TERMINATOR_LEN: usize = 6;

    pub fn serialize<S: ByteSink>(&self, writer: &mut BinaryWriter<S>) -> bool {
        if !writer.write_bytes(Self::HEADER) {
            return false;
        }
        if let Some(key) = self.query_key {
            if !(writer.write(Self::KEY_MARKER) && writer.write(key) && writer.write(0u8)) {
                return false;
            }
        }
        self.servers
            .iter()
            .all(|server| writer.write_net_address(server))
            && writer.write_byte_repeated(0, Self::TERMINATOR_LEN)
    }

    /// Decodes a list whose entries all belong to `family`.
    ///
    /// `expect_key` says whether the query carried a `key`; only then is
    /// the list preceded by the key echo block. Reading stops at the
    /// all-zero terminator; a list that ends without one is rejected.
    /// IPv6 lists still end with a 6-byte terminator.
    pub fn parse(data: &[u8], family: AddressFamily, expect_key: bool) -> Option<Self> {
        let mut reader = BinaryReader::new(data);
        if reader.read_bytes(Self::HEADER.len())? != Self::HEADER {
            return None;
        }

        let mut response = Self::default();
        if expect_key {
            if reader.try_read::<u8>()? != Self::KEY_MARKER {
                return None;
            }
            response.query_key = Some(reader.try_read::<u32>()?);
            reader.try_read::<u8>()?;
        }

        let entry_len = family.address_len() + 2;
        loop {
            if reader.remaining() < entry_len {
                let tail = reader.read_bytes(Self::TERMINATOR_LEN)?;
                return tail.iter().all(|&b| b == 0).then_some(response);
            }

            let entry = reader.read_bytes(entry_len)?;
            if entry.iter().all(|&b| b == 0) {
                return Some(response);
            }

            let (ip, port) = entry.split_at(family.address_len());
            let ip = match family {
                AddressFamily::IPv4 => IpAddr::V4(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])),
                AddressFamily::IPv6 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(ip).ok()?)),
            };
            let port = u16::from_be_bytes([port[0], port[1]]);
            response.servers.push(NetAddress::from_ip(ip, port));
        }
    }
}

/// Challenge handed to a game server before it may register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerChallengeResponse {
    pub challenge: u32,
    pub client_challenge: Option<u32>,
}

impl ServerChallengeResponse {
    pub const HEADER: &'static [u8] = b"\xff\xff\xff\xffs\n";

    pub fn serialize<S: ByteSink>(&self, writer: &mut BinaryWriter<S>) -> bool {
        writer.write_bytes(Self::HEADER)
            && writer.write(self.challenge)
            && self.client_challenge.map_or(true, |echo| writer.write(echo))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminChallengeResponse {
    pub master: u32,
    pub hash: u32,
}

impl AdminChallengeResponse {
    pub const HEADER: &'static [u8] = b"\xff\xff\xff\xffadminchallenge";

    pub fn serialize<S: ByteSink>(&self, writer: &mut BinaryWriter<S>) -> bool {
        writer.write_bytes(Self::HEADER) && writer.write(self.master) && writer.write(self.hash)
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = BinaryReader::new(data);
        if reader.read_bytes(Self::HEADER.len())? != Self::HEADER {
            return None;
        }
        let master = reader.read::<u32>();
        let hash = reader.read::<u32>();
        (!reader.underflowed()).then_some(Self { master, hash })
    }
}

/// Tells a NAT-bypass server which client wants to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatAnnounce {
    pub client: NetAddress,
}

impl NatAnnounce {
    pub const HEADER: &'static [u8] = b"\xff\xff\xff\xffc ";

    /// `ip:port` text, not NUL-terminated.
    pub fn serialize<S: ByteSink>(&self, writer: &mut BinaryWriter<S>) -> bool {
        let text = format!("{}:{}", self.client, self.client.port());
        writer.write_bytes(Self::HEADER) && writer.write_cstring(&text, false)
    }
}

/// Fake server entry used to show a text line in an outdated client's browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeServerInfo {
    pub message: String,
    pub gamedir: String,
}

impl FakeServerInfo {
    pub const HEADER: &'static [u8] = b"\xff\xff\xff\xffinfo\n";

    pub fn new(message: impl Into<String>, gamedir: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            gamedir: gamedir.into(),
        }
    }

    pub fn infostring(&self) -> Infostring {
        let mut info = Infostring::new();
        info.insert("host", self.message.as_str());
        info.insert("map", "update");
        info.insert("dm", "0");
        info.insert("team", "0");
        info.insert("coop", "0");
        info.insert("numcl", "32");
        info.insert("maxcl", "32");
        info.insert("gamedir", self.gamedir.as_str());
        info
    }

    pub fn serialize<S: ByteSink>(&self, writer: &mut BinaryWriter<S>) -> bool {
        writer.write_bytes(Self::HEADER) && writer.write_cstring(&self.infostring().to_string(), false)
    }

    pub fn parse(data: &[u8]) -> Option<Infostring> {
        let body = data.strip_prefix(Self::HEADER)?;
        Some(Infostring::parse(&String::from_utf8_lossy(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::FixedBuffer;

    fn encode(f: impl FnOnce(&mut BinaryWriter<Vec<u8>>) -> bool) -> Vec<u8> {
        let mut writer = BinaryWriter::growable();
        assert!(f(&mut writer));
        writer.into_inner()
    }

    #[test]
    fn test_empty_server_list() {
        let data = encode(|w| ClientQueryResponse::default().serialize(w));
        assert_eq!(data, b"\xff\xff\xff\xfff\n\0\0\0\0\0\0");
    }

    #[test]
    fn test_server_list_with_key_echo() {
        let response = ClientQueryResponse {
            query_key: Some(0x0102_0304),
            servers: vec![NetAddress::parse("1.2.3.4", 27015).unwrap()],
        };
        let data = encode(|w| response.serialize(w));

        let mut expected = ClientQueryResponse::HEADER.to_vec();
        expected.extend_from_slice(&[0x7F, 4, 3, 2, 1, 0]);
        expected.extend_from_slice(&[1, 2, 3, 4, 0x69, 0x87]);
        expected.extend_from_slice(&[0; 6]);
        assert_eq!(data, expected);

        let parsed = ClientQueryResponse::parse(&data, AddressFamily::IPv4, true).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_server_list_ipv6_entries() {
        let response = ClientQueryResponse {
            query_key: None,
            servers: vec![
                NetAddress::parse("2001:db8::5", 27015).unwrap(),
                NetAddress::parse("::1", 27016).unwrap(),
            ],
        };
        let data = encode(|w| response.serialize(w));
        assert_eq!(data.len(), 6 + 2 * 18 + 6);

        let parsed = ClientQueryResponse::parse(&data, AddressFamily::IPv6, false).unwrap();
        assert_eq!(parsed.servers, response.servers);
    }

    #[test]
    fn test_server_list_without_terminator_is_rejected() {
        let mut data = ClientQueryResponse::HEADER.to_vec();
        data.extend_from_slice(&[1, 2, 3, 4, 0, 80]);
        assert!(ClientQueryResponse::parse(&data, AddressFamily::IPv4, false).is_none());
        assert!(ClientQueryResponse::parse(b"garbage", AddressFamily::IPv4, false).is_none());
    }

    #[test]
    fn test_loopback_server_is_not_a_key_echo() {
        let response = ClientQueryResponse {
            query_key: None,
            servers: vec![
                NetAddress::parse("127.0.0.1", 27015).unwrap(),
                NetAddress::parse("10.0.0.2", 27016).unwrap(),
            ],
        };
        let data = encode(|w| response.serialize(w));

        let parsed = ClientQueryResponse::parse(&data, AddressFamily::IPv4, false).unwrap();
        assert_eq!(parsed, response);
        // read as an echo block, the loopback entry is lost
        assert!(ClientQueryResponse::parse(&data, AddressFamily::IPv4, true)
            .map_or(true, |list| list != response));
    }

    #[test]
    fn test_challenge_response() {
        let plain = ServerChallengeResponse {
            challenge: 0xAABB_CCDD,
            client_challenge: None,
        };
        assert_eq!(
            encode(|w| plain.serialize(w)),
            b"\xff\xff\xff\xffs\n\xdd\xcc\xbb\xaa"
        );

        let echoed = ServerChallengeResponse {
            challenge: 1,
            client_challenge: Some(2),
        };
        assert_eq!(
            encode(|w| echoed.serialize(w)),
            b"\xff\xff\xff\xffs\n\x01\0\0\0\x02\0\0\0"
        );
    }

    #[test]
    fn test_admin_challenge_response() {
        let response = AdminChallengeResponse { master: 5, hash: 6 };
        let data = encode(|w| response.serialize(w));
        assert_eq!(data.len(), AdminChallengeResponse::HEADER.len() + 8);
        assert_eq!(AdminChallengeResponse::parse(&data), Some(response));
        assert_eq!(AdminChallengeResponse::parse(&data[..data.len() - 1]), None);
    }

    #[test]
    fn test_nat_announce() {
        let announce = NatAnnounce {
            client: NetAddress::parse("192.168.0.7", 40000).unwrap(),
        };
        assert_eq!(
            encode(|w| announce.serialize(w)),
            b"\xff\xff\xff\xffc 192.168.0.7:40000"
        );
    }

    #[test]
    fn test_fake_server_info() {
        let info = FakeServerInfo::new("Please update", "valve");
        let data = encode(|w| info.serialize(w));
        assert!(data.starts_with(FakeServerInfo::HEADER));
        assert!(!data.ends_with(b"\0"));

        let parsed = FakeServerInfo::parse(&data).unwrap();
        assert_eq!(parsed.get("host"), Some("Please update"));
        assert_eq!(parsed.get("gamedir"), Some("valve"));
        assert_eq!(parsed.get("map"), Some("update"));
        assert_eq!(parsed.get("numcl"), Some("32"));
    }

    #[test]
    fn test_fixed_buffer_too_small() {
        let mut storage = [0u8; 8];
        let mut writer = BinaryWriter::new(FixedBuffer::new(&mut storage));
        let response = ServerChallengeResponse {
            challenge: 1,
            client_challenge: Some(2),
        };
        assert!(!response.serialize(&mut writer));
    }
}
