// src/lib.rs
pub mod config;
pub mod echogram;
pub mod engine;
pub mod types;
