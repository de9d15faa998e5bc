use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    pub fn address_len(self) -> usize {
        match self {
            AddressFamily::IPv4 => 4,
            AddressFamily::IPv6 => 16,
        }
    }
}

/// IPv4 or IPv6 endpoint.
///
/// `==` and `Hash` include the port. Use [`NetAddress::host`] for the
/// address-only identity used by per-IP tables.
#[derive(Debug, Clone, Copy)]
pub struct NetAddress {
    family: AddressFamily,
    data: [u8; 16],
    port: u16,
}

impl NetAddress {
    /// Zeroed address of the given family.
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            data: [0; 16],
            port: 0,
        }
    }

    /// Parses presentation-format text of a fixed family.
    pub fn from_text(family: AddressFamily, text: &str, port: u16) -> Option<Self> {
        let ip = match family {
            AddressFamily::IPv4 => IpAddr::V4(text.parse::<Ipv4Addr>().ok()?),
            AddressFamily::IPv6 => IpAddr::V6(text.parse::<Ipv6Addr>().ok()?),
        };
        Some(Self::from_ip(ip, port))
    }

    /// Parses dotted-quad or colon-hex text, trying IPv4 first.
    pub fn parse(text: &str, port: u16) -> Option<Self> {
        Self::from_text(AddressFamily::IPv4, text, port)
            .or_else(|| Self::from_text(AddressFamily::IPv6, text, port))
    }

    pub fn from_ip(ip: IpAddr, port: u16) -> Self {
        let mut address = match ip {
            IpAddr::V4(v4) => {
                let mut address = Self::new(AddressFamily::IPv4);
                address.data[..4].copy_from_slice(&v4.octets());
                address
            }
            IpAddr::V6(v6) => {
                let mut address = Self::new(AddressFamily::IPv6);
                address.data.copy_from_slice(&v6.octets());
                address
            }
        };
        address.port = port;
        address
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The 4 or 16 significant address bytes.
    pub fn address_span(&self) -> &[u8] {
        &self.data[..self.family.address_len()]
    }

    pub fn equals(&self, other: &NetAddress, include_port: bool) -> bool {
        if self.family != other.family {
            return false;
        }
        if include_port && self.port != other.port {
            return false;
        }
        self.address_span() == other.address_span()
    }

    pub fn host(&self) -> HostAddress {
        HostAddress(*self)
    }

    pub fn ip(&self) -> IpAddr {
        match self.family {
            AddressFamily::IPv4 => {
                IpAddr::V4(Ipv4Addr::new(self.data[0], self.data[1], self.data[2], self.data[3]))
            }
            AddressFamily::IPv6 => IpAddr::V6(Ipv6Addr::from(self.data)),
        }
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip(), self.port)
    }
}

impl PartialEq for NetAddress {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, true)
    }
}

impl Eq for NetAddress {}

impl Hash for NetAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_span().hash(state);
        self.port.hash(state);
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::from_ip(addr.ip(), addr.port())
    }
}

/// Prints the address without the port.
impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ip().fmt(f)
    }
}

/// Address-only view of a [`NetAddress`]: equality and hashing ignore the port.
#[derive(Debug, Clone, Copy)]
pub struct HostAddress(NetAddress);

impl HostAddress {
    pub fn address(&self) -> &NetAddress {
        &self.0
    }
}

impl PartialEq for HostAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0, false)
    }
}

impl Eq for HostAddress {}

impl Hash for HostAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.address_span().hash(state);
    }
}

impl From<NetAddress> for HostAddress {
    fn from(address: NetAddress) -> Self {
        HostAddress(address)
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
