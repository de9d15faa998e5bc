//! Builds the server list returned to a client query.

use crate::server_entry::ServerEntry;
use protocol::{ClientQueryRequest, ClientQueryResponse, NetAddress};

/// Filter applied to the registry on behalf of one querying client.
#[derive(Debug, Clone)]
pub struct ServerListQuery<'a> {
    pub client: NetAddress,
    pub gamedir: &'a str,
    pub nat_bypass: bool,
    pub protocol: Option<u32>,
    pub query_key: Option<u32>,
}

/// Result of a query: the list to send back and the NAT-bypass servers
/// that must be told about the client.
#[derive(Debug, Clone, Default)]
pub struct ServerList {
    pub response: ClientQueryResponse,
    pub nat_announced: Vec<NetAddress>,
}

impl<'a> ServerListQuery<'a> {
    pub fn from_request(client: NetAddress, request: &'a ClientQueryRequest) -> Self {
        Self {
            client,
            gamedir: &request.gamedir,
            nat_bypass: request.nat_bypass,
            protocol: request.protocol_version,
            query_key: request.query_key,
        }
    }

    /// A server is listed only if it shares the client's address family,
    /// NAT mode and gamedir, and its protocol when the client sent one.
    pub fn matches(&self, entry: &ServerEntry) -> bool {
        entry.address.family() == self.client.family()
            && entry.nat_bypass == self.nat_bypass
            && entry.gamedir == self.gamedir
            && self.protocol.map_or(true, |protocol| entry.protocol == protocol)
    }

    pub fn build<'e>(&self, entries: impl IntoIterator<Item = &'e ServerEntry>) -> ServerList {
        let servers: Vec<NetAddress> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .map(|entry| entry.address)
            .collect();

        let nat_announced = if self.nat_bypass {
            servers.clone()
        } else {
            Vec::new()
        };

        ServerList {
            response: ClientQueryResponse {
                query_key: self.query_key,
                servers,
            },
            nat_announced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(addr: &str, gamedir: &str, protocol: u32, nat: bool) -> ServerEntry {
        let mut entry = ServerEntry::new(NetAddress::parse(addr, 27015).unwrap());
        entry.gamedir = gamedir.to_string();
        entry.protocol = protocol;
        entry.nat_bypass = nat;
        entry
    }

    fn query<'a>(client: &str, gamedir: &'a str) -> ServerListQuery<'a> {
        ServerListQuery {
            client: NetAddress::parse(client, 40000).unwrap(),
            gamedir,
            nat_bypass: false,
            protocol: None,
            query_key: None,
        }
    }

    #[test]
    fn test_filters_by_gamedir_and_family() {
        let entries = vec![
            entry("10.0.0.1", "valve", 49, false),
            entry("10.0.0.2", "cstrike", 49, false),
            entry("2001:db8::1", "valve", 49, false),
        ];

        let list = query("192.0.2.1", "valve").build(&entries);
        assert_eq!(list.response.servers, vec![entries[0].address]);
        assert!(list.nat_announced.is_empty());

        let list = query("2001:db8::99", "valve").build(&entries);
        assert_eq!(list.response.servers, vec![entries[2].address]);
    }

    #[test]
    fn test_filters_by_protocol_only_when_given() {
        let entries = vec![
            entry("10.0.0.1", "valve", 48, false),
            entry("10.0.0.2", "valve", 49, false),
        ];

        let mut filter = query("192.0.2.1", "valve");
        assert_eq!(filter.build(&entries).response.servers.len(), 2);

        filter.protocol = Some(49);
        assert_eq!(
            filter.build(&entries).response.servers,
            vec![entries[1].address]
        );
    }

    #[test]
    fn test_nat_mode_must_match_and_is_announced() {
        let entries = vec![
            entry("10.0.0.1", "valve", 49, true),
            entry("10.0.0.2", "valve", 49, false),
        ];

        let mut filter = query("192.0.2.1", "valve");
        filter.nat_bypass = true;
        filter.query_key = Some(0xABCD);
        let list = filter.build(&entries);

        assert_eq!(list.response.servers, vec![entries[0].address]);
        assert_eq!(list.nat_announced, vec![entries[0].address]);
        assert_eq!(list.response.query_key, Some(0xABCD));
    }

    #[test]
    fn test_empty_registry() {
        let list = query("192.0.2.1", "valve").build(std::iter::empty());
        assert!(list.response.servers.is_empty());
        assert!(list.nat_announced.is_empty());
    }
}
