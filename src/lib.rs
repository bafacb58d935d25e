// src/lib.rs

//! Bulletin Officiel API library.
//!
//! Re-publishes the Moroccan Bulletin Officiel listings (French and Arabic)
//! as normalized JSON, with a per-locale local cache that can be served
//! without touching the gazette portal.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
