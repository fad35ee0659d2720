//! Pantry, recipes and rewards service. The binary in `main.rs` only wires
//! config, logging and the HTTP listener around this library.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod donations;
pub mod matching;
pub mod notifications;
pub mod pantry;
pub mod recipes;
pub mod rewards;
pub mod state;
