//! Page production and the regeneration pipeline.

pub mod build;
pub mod error;
pub mod generated;
pub mod page;
pub mod pipeline;
pub mod producer;
pub mod token;
pub mod wire;
