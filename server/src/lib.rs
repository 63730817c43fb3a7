//! Authoritative world simulation for the realm server.
//!
//! The library owns everything that runs inside one world: map geometry,
//! entities, zone groups, combat, areas, timers and sessions. The binary
//! adds configuration, logging and the UDP transport.

pub mod config;
pub mod entities;
pub mod world;
