//! # Master Server Wire Protocol
//!
//! Leaf components shared by the master server and its tools. Nothing in
//! this crate performs I/O; every type works on byte slices.
//!
//! - [`binary`]: bounds-checked reader/writer with a sticky underflow flag
//! - [`infostring`]: the `\key\value` text format
//! - [`address`]: IPv4/IPv6 endpoint with port-aware and address-only identity
//! - [`version`]: `major.minor[.patch]` versions used for client/server gating
//! - [`requests`] / [`responses`]: typed packets, one per datagram kind
//!
//! Scalars travel little-endian; address ports travel big-endian.

pub mod address;
pub mod binary;
pub mod infostring;
pub mod requests;
pub mod responses;
pub mod version;

pub use address::{AddressFamily, HostAddress, NetAddress};
pub use binary::{BinaryReader, BinaryWriter, ByteSink, FixedBuffer, Scalar};
pub use infostring::Infostring;
pub use requests::{
    AdminChallengeRequest, AdminCommandRequest, ClientQueryRequest, ServerAppendRequest,
    ServerChallengeRequest,
};
pub use responses::{
    AdminChallengeResponse, ClientQueryResponse, FakeServerInfo, NatAnnounce,
    ServerChallengeResponse,
};
pub use version::VersionInfo;
