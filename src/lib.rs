// src/lib.rs

//! Threadmark Crawler Library
//!
//! Incrementally harvests threadmarked posts from XenForo forum threads and
//! keeps them in a tiered on-disk cache (story records, rendered posts and
//! images) so that repeated runs only fetch what changed.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod site;
pub mod storage;
pub mod utils;
