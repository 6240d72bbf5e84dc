// src/providers/mod.rs

//! Upstream data providers.

pub mod socrata;
