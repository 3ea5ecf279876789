pub mod args;
pub mod cache;
pub mod database;
pub mod error;
pub mod messaging;
pub mod model;
pub mod service;
pub mod utils;
