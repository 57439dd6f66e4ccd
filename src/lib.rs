pub mod cli;
pub mod config;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod interactive;
pub mod loader;
pub mod mirror;
pub mod store;
