pub mod backup;
pub mod cli;
pub mod config;
pub mod device;
pub mod eject;
pub mod error;
pub mod health;
pub mod mount;
pub mod pipeline;
pub mod pool;
pub mod repo;
pub mod types;
pub mod util;
pub mod verify;
pub mod workflow;

#[cfg(test)]
mod testing;
