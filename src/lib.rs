//! Response caching and regeneration core for static and hybrid sites.
//!
//! Pages declare how a response is produced ([`application::page`]); the
//! [`application::pipeline`] decides per request whether to serve a cached
//! artifact, rebuild it, or generate it live.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
