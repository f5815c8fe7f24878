//! HTTP front-end for verbose recording sessions.

pub mod server;
