//! vaani-gateway: HTTP front end for the Vaani command router
//!
//! Exposes `Coordinator::handle` as `POST /process-command` along with
//! capability listing and health endpoints.

pub mod protocol;
pub mod server;

pub use server::GatewayServer;
