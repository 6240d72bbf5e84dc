// src/lib.rs

//! PermitPulse API Library

pub mod cache;
pub mod classify;
pub mod error;
pub mod intake;
pub mod models;
pub mod normalize;
pub mod parsers;
pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod server;
