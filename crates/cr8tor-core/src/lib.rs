pub mod action;
pub mod commands;
pub mod config;
pub mod contract;
pub mod crate_doc;
pub mod error;
pub mod graph;
pub mod io;
pub mod lifecycle;
pub mod lock;
pub mod paths;
pub mod project;
pub mod resource;
pub mod service;
pub mod store;
pub mod types;
pub mod verify;

pub use error::{Cr8torError, Result};
