// Library exports for chirpnest
// This allows integration tests and the binary to share modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod live;
pub mod media;
pub mod routes;
pub mod social;
pub mod state;
