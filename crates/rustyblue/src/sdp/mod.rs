//! Service Discovery Protocol: the data element wire format, a service
//! record database, and the client/server request engines (PSM 0x0001).

pub mod client;
pub mod protocol;
pub mod server;
pub mod types;

pub use client::{SdpClient, SdpTransport};
pub use server::SdpServer;
pub use types::*;
