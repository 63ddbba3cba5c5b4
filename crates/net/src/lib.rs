#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! HTTP plumbing for rebuildr
//!
//! A pooled reqwest wrapper with retry logic, and the per-ecosystem
//! token-bucket rate limiter shared by every registry caller.

pub mod client;
pub mod ratelimit;

pub use client::{NetClient, NetConfig};
pub use ratelimit::{RegistryLimiter, TokenBucket};
