//! Lantern web library.
//!
//! This crate provides the site and its request pipeline as a library,
//! allowing it to be tested and reused. The binary in `main.rs` wires it to
//! `PostgreSQL`; tests wire it to in-memory stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use app::build_router;
