use std::{env, net::IpAddr};

// Runtime/server constants and environment lookups.

pub fn http_port() -> u16 {
    env::var("SYNC_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000)
}

// TV and Remote reach the server over the LAN, so listen on all interfaces by default.
pub fn bind_host() -> IpAddr {
    env::var("SYNC_SERVER_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 256;
pub const SNAPSHOT_BROADCAST_CAPACITY: usize = 64;
