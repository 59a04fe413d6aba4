pub mod board;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod images;
pub mod logging;
pub mod notify;
pub mod service;
pub mod settings;
pub mod sync;
pub mod types;
