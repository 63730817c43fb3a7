//! UDP transport for the game worlds.

mod server;

pub use server::Server;
