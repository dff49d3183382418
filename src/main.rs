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
use rusty_chatd::activity::FileActivityLog;
use rusty_chatd::config::Config;
use rusty_chatd::server::{Server, ServerError};

use clap::{value_t, App, Arg};
use log::{error, info};
use std::process;

async fn start(config: Config) -> Result<(), ServerError> {
    let activity = FileActivityLog::open(&config.log_file)
        .map_err(|e| ServerError::ActivityLog(config.log_file.clone(), e))?;
    let server = Server::bind(config, Box::new(activity))?;
    tokio::select! {
        res = server.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down server...");
            Ok(())
        }
    }
}

// everything runs on this one thread, the chat state is never shared
#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("rusty-chatd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("line based chat server with private, group and file messages")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON config file")
                .takes_value(true)
                .default_value("config.json"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("port to listen on, overrides the config file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("activity log, overrides the config file")
                .takes_value(true),
        )
        .get_matches();

    let mut config = match Config::load(matches.value_of("config").unwrap_or("config.json")) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    if matches.is_present("port") {
        config.port = value_t!(matches, "port", u16).unwrap_or_else(|e| e.exit());
    }
    if let Some(path) = matches.value_of("log-file") {
        config.log_file = path.to_string();
    }

    if let Err(e) = start(config).await {
        error!("{}", e);
        process::exit(1);
    }
}
