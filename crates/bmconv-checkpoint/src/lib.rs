#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod config;
mod error;
mod loader;

pub use config::{CONFIG_FILE, HfConfig, config_path, load_hf_config};
pub use error::CheckpointError;
pub use loader::SafetensorsSource;
