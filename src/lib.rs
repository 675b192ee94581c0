//! Access-controlled HLS reverse proxy.
//!
//! Requests name a target with `?url=`; the proxy fetches it with sanitised
//! headers, relays the response with permissive CORS headers, and rewrites
//! M3U8 playlists so every segment and variant is fetched through the proxy
//! as well.

pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod server;
pub mod upstream;
