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
// the event loop: accepts connections, hands readable bytes to the chat
// core and tears down dead connections. it all runs on one task, the
// per-connection tasks in client.rs only move bytes
use crate::activity::ActivityLog;
use crate::chat::Core;
use crate::client::{Connections, Event};
use crate::config::{Config, ConfigError};

use std::net::SocketAddr;
use std::time::Instant;
use std::{error, fmt, io};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;

use log::{info, warn};

#[derive(Debug)]
pub enum ServerError {
    Bind(SocketAddr, io::Error),
    Config(ConfigError),
    ActivityLog(String, io::Error),
}

impl error::Error for ServerError {}
impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "couldn't listen on {}: {}", addr, e),
            ServerError::Config(e) => write!(f, "{}", e),
            ServerError::ActivityLog(path, e) => write!(f, "couldn't open log file {}: {}", path, e),
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError::Config(e)
    }
}

enum Wake {
    Accept(io::Result<(TcpStream, SocketAddr)>),
    Ready(Option<Event>),
    Tick,
}

pub struct Server {
    listener: TcpListener,
    config: Config,
    core: Core<Connections>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

impl Server {
    /* listen on every interface at the configured port */
    pub fn bind(config: Config, activity: Box<dyn ActivityLog + Send>) -> Result<Server, ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        Server::bind_addr(addr, config, activity)
    }

    pub fn bind_addr(
        addr: SocketAddr,
        config: Config,
        activity: Box<dyn ActivityLog + Send>,
    ) -> Result<Server, ServerError> {
        let listener = listen(addr, config.backlog).map_err(|e| ServerError::Bind(addr, e))?;
        let (events_tx, events_rx) = mpsc::channel(config.max_events.max(1));
        let core = Core::new(Connections::new(), activity, config.limits());
        Ok(Server {
            listener,
            config,
            core,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(mut self) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Starting chat server on {}", addr);
        }
        let mut tick = tokio::time::interval(self.config.tick());
        loop {
            let wake = tokio::select! {
                accepted = self.listener.accept() => Wake::Accept(accepted),
                event = self.events_rx.recv() => Wake::Ready(event),
                _ = tick.tick() => Wake::Tick,
            };
            match wake {
                Wake::Accept(Ok((socket, addr))) => self.accept(socket, addr),
                // running out of descriptors shouldn't take everyone else down
                Wake::Accept(Err(e)) => warn!("accept failed: {}", e),
                Wake::Ready(Some(event)) => {
                    self.dispatch(event).await;
                    for _ in 1..self.config.max_events {
                        match self.events_rx.try_recv() {
                            Ok(event) => self.dispatch(event).await,
                            Err(_) => break,
                        }
                    }
                }
                // we hold a sender ourselves, so this can't really happen
                Wake::Ready(None) => return Ok(()),
                Wake::Tick => {
                    if let Some(timeout) = self.config.inactivity_timeout() {
                        self.core.sweep_idle(Instant::now(), timeout);
                    }
                }
            }
        }
    }

    fn accept(&mut self, socket: TcpStream, addr: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            warn!("set_nodelay for {} failed: {}", addr, e);
        }
        let id = self.core.connected();
        self.core.outbox.attach(
            id,
            socket,
            addr,
            self.events_tx.clone(),
            self.config.buffer_size,
        );
        info!(
            "New client connected: {} (session {}, {} open)",
            addr,
            id,
            self.core.outbox.len()
        );
    }

    async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Readable(id, bytes) => self.core.received(id, &bytes).await,
            Event::Closed(id) => {
                if self.core.is_connected(id) {
                    self.core.disconnect(id);
                }
            }
        }
    }
}
