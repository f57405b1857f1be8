pub mod build;
pub mod config;
pub mod lifecycle;
pub mod status;
