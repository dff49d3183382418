/* rusty-chatd - a chat server written in Rust
*  Copyright (C) 2020 Joanna Janet Zaitseva-Doyle <jjadoyle@gmail.com>

*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Lesser General Public License as
*  published by the Free Software Foundation, either version 3 of the
*  License, or (at your option) any later version.

*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Lesser General Public License for more details.

*  You should have received a copy of the GNU Lesser General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use crate::chat::Limits;

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use std::{error, fmt, io};

use log::warn;

pub const DEFAULT_PORT: u16 = 12345;

#[derive(Debug)]
pub enum ConfigError {
    Read(io::Error),
    Parse(serde_json::Error),
}

impl error::Error for ConfigError {}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "couldn't read config: {}", e),
            ConfigError::Parse(e) => write!(f, "couldn't parse config: {}", e),
        }
    }
}

// field names match the keys of the JSON config file, anything missing
// falls back to its default
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub max_events: usize,
    pub backlog: u32,
    pub buffer_size: usize,
    pub max_username_len: usize,
    pub max_message_len: usize,
    pub epoll_timeout: u64,              // ms between sweeps of the loop
    pub client_inactivity_timeout: u64, // ms, 0 turns it off
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            max_events: 1000,
            backlog: 50,
            buffer_size: 4096,
            max_username_len: 32,
            max_message_len: 1024,
            epoll_timeout: 1000,
            client_inactivity_timeout: 300_000,
            log_file: String::from("chatserver.log"),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    /* a missing file just means defaults, a broken one is an error */
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(text) => Config::from_json(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "could not open config file {}, using defaults",
                    path.as_ref().display()
                );
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::Read(e)),
        }
    }

    pub fn limits(&self) -> Limits {
        let buffer_size = self.buffer_size.max(1);
        Limits {
            max_username_len: self.max_username_len,
            max_message_len: self.max_message_len,
            chunk_size: buffer_size,
            line_limit: buffer_size.max(self.max_message_len),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.epoll_timeout.max(1))
    }

    pub fn inactivity_timeout(&self) -> Option<Duration> {
        match self.client_inactivity_timeout {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
