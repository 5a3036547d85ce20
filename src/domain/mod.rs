//! Value types shared by every layer: page data, route patterns, response values.

pub mod data;
pub mod error;
pub mod response;
pub mod route;
