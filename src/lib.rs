//! # mogilefs-client
//!
//! A blocking client for MogileFS trackers. It checks whether keys exist and
//! stores objects with the tracker's two-phase protocol: reserve a location
//! with `CREATE_OPEN`, PUT the bytes to the storage node, then confirm with
//! `CREATE_CLOSE`.
//!
//! ## Features
//!
//! - **Tracker failover**: endpoints are tried in the configured order
//! - **Streaming uploads**: in-memory buffers with a declared length, no temp files
//! - **Typed errors**: connection, I/O, protocol and upload failures are distinct
//! - **Thread-safe**: clients hold no mutable state and take `&self`
//!
//! ## Quick Start
//!
//! ```no_run
//! use mogilefs_client::{Client, ClientConfig, TrackerEndpoint};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         vec![
//!             TrackerEndpoint::new("tracker1.local", 7001),
//!             TrackerEndpoint::new("tracker2.local", 7001),
//!         ],
//!         5,
//!     );
//!     let client = Client::new(config)?;
//!
//!     client.put("img1", b"Hello, World".to_vec(), "photos", "orig")?;
//!
//!     if client.exists("img1", "photos")? {
//!         println!("Object exists!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod tracker;
pub mod types;
pub mod uploader;

// Re-export main types for convenience
pub use client::{close_request, Client};
pub use codec::{
    build_request, decode_field, decode_field_str, encode_field, encode_field_bytes,
    parse_response, ResponseFields, TrackerRequest, TrackerResponse,
};
pub use error::{ConnectFailure, EndpointFailure, Error, Result};
pub use tracker::{connect, connect_with, TrackerConnection};
pub use types::*;
pub use uploader::{upload, HttpTransport, StorageTransport, UploadBody};
