// Network adapter modules split by client sockets vs operator HTTP routes.

pub mod client;
pub mod internal;

pub use client::{encode_snapshot, snapshot_serializer, spawn_snapshot_serializer, ws_handler};
pub use internal::{health_handler, state_handler};
