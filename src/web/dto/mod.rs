//! Data Transfer Objects for the gallery API.

pub mod response;

pub use response::*;
