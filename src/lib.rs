pub mod client;
pub mod config;
pub mod docker;
pub mod environment;
pub mod error;
pub mod image;
pub mod image_reference;
pub mod models;
pub mod poll;
pub mod project;
pub mod scenario;
pub mod secret_string;
pub mod system;
pub mod transfer;
pub mod user;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
