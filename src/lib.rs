pub mod cli;
pub mod config;
pub mod error;
pub mod resolve;
pub mod sync;
pub mod util;
