// src/lib.rs

//! Bidding document review core: rubric scoring, result caching and
//! resilient access to the remote analysis service.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod scoring;
pub mod service;
