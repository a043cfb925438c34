//! Configuration file handling.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::DatabaseParameters;
use crate::socket::SocketParameters;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read the configuration from file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot deserialize the configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Configuration {
    pub database_connection_parameters: DatabaseParameters,
    pub socket_connection_parameters: SocketParameters,
}

impl Configuration {
    pub fn from_yaml(configuration_string: &str) -> Result<Configuration, ConfigError> {
        Ok(serde_yaml::from_str::<Configuration>(configuration_string)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
        let mut configuration_file = File::open(path)?;
        let mut configuration_string = String::new();
        configuration_file.read_to_string(&mut configuration_string)?;
        Configuration::from_yaml(configuration_string.as_str())
    }
}
