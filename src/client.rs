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
// client
// this file contains the socket code for connected clients: a reader task
// that reports readiness (bytes or EOF) to the dispatcher, and a writer
// task draining the client's output queue. neither touches chat state
use crate::chat::registry::SessionId;
use crate::chat::{Closed, Outbox};

use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use log::debug;

#[derive(Debug)]
pub enum Event {
    Readable(SessionId, Vec<u8>),
    Closed(SessionId),
}

#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    output: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
}

// the socket table, owned by the server's dispatcher
#[derive(Debug, Default)]
pub struct Connections {
    peers: HashMap<SessionId, Peer>,
}

impl Connections {
    pub fn new() -> Connections {
        Connections {
            peers: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn attach(
        &mut self,
        id: SessionId,
        socket: TcpStream,
        addr: SocketAddr,
        events: mpsc::Sender<Event>,
        buffer_size: usize,
    ) {
        let (mut rd, mut wr) = socket.into_split();
        let (output, mut queue) = mpsc::unbounded_channel::<Vec<u8>>();

        let write_events = events.clone();
        tokio::spawn(async move {
            while let Some(bytes) = queue.recv().await {
                if let Err(e) = wr.write_all(&bytes).await {
                    debug!("write to session {} failed: {}", id, e);
                    let _ = write_events.send(Event::Closed(id)).await;
                    return;
                }
            }
            // output queue dropped: flush is done, hang up our side
            let _ = wr.shutdown().await;
        });

        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; buffer_size.max(1)];
            loop {
                match rd.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if events.send(Event::Readable(id, buf[..n].to_vec())).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!("read from session {} failed: {}", id, e);
                        break;
                    }
                }
            }
            let _ = events.send(Event::Closed(id)).await;
        });

        self.peers.insert(
            id,
            Peer {
                addr,
                output,
                reader,
            },
        );
    }
}

impl Outbox for Connections {
    fn send(&mut self, to: SessionId, bytes: Vec<u8>) -> Result<(), Closed> {
        match self.peers.get(&to) {
            Some(peer) => peer.output.send(bytes).map_err(|_| Closed(to)),
            None => Err(Closed(to)),
        }
    }

    /* stop reading right away, the writer still flushes whatever is queued
     * (an eviction notice, say) before the socket goes down */
    fn disconnect(&mut self, id: SessionId) {
        if let Some(peer) = self.peers.remove(&id) {
            peer.reader.abort();
            debug!("closing session {} ({})", id, peer.addr);
        }
    }
}
