// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

pub mod bus;
pub mod core;
pub mod engine;
pub mod math;
pub mod plan;
pub mod protocol;
pub mod store;
pub mod time;
pub mod transport;

mod config;
mod runtime;

pub use self::config::{Config, EngineConfig, StoreConfig, SystemConfig, TransportConfig};
pub use self::runtime::{run, Error, Result};

/// Read a TOML configuration from file.
pub fn from_file<T: serde::de::DeserializeOwned>(
    path: impl AsRef<std::path::Path>,
) -> std::io::Result<T> {
    let contents = std::fs::read_to_string(path)?;

    toml::from_str(&contents).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
