//! Pulse realtime server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod fanout;
pub mod routes;
pub mod state;
pub mod status;
pub mod ws;
