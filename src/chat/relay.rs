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
// file relay
// moves a counted run of bytes to a target connection, either read from a
// file on the server's disk or forwarded from the sender's own connection
use crate::chat::registry::SessionId;
use crate::chat::Outbox;

use std::path::Path;
use std::{error, fmt};
use tokio::io::{AsyncRead, AsyncReadExt};

use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct FileTransferHeader {
    pub sender: String,
    pub target: String,
    pub filename: String,
    pub size: u64,
}

impl FileTransferHeader {
    pub fn new(sender: &str, target: &str, name: &str, size: u64) -> FileTransferHeader {
        FileTransferHeader {
            sender: sender.to_string(),
            target: target.to_string(),
            filename: display_name(name),
            size,
        }
    }

    pub fn notice(&self) -> String {
        format!(
            "[File incoming] {} from {} ({} bytes)",
            self.filename, self.sender, self.size
        )
    }
}

/* targets only ever see the last path component, never where the
 * file lives on the sender's (or the server's) disk */
pub fn display_name(name: &str) -> String {
    match Path::new(name).file_name() {
        Some(base) => base.to_string_lossy().to_string(),
        None => name.to_string(),
    }
}

#[derive(Debug, PartialEq)]
pub enum RelayError {
    ShortRead(u64),
    WriteFailed(u64),
}

impl error::Error for RelayError {}
impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelayError::ShortRead(sent) => write!(f, "source ran dry after {} bytes", sent),
            RelayError::WriteFailed(sent) => write!(f, "target went away after {} bytes", sent),
        }
    }
}

/* send exactly header.size bytes from src to the target in chunks of at
 * most chunk_size, anything less is an error, bytes already queued for the
 * target stay queued */
pub async fn stream<R, O>(
    src: &mut R,
    header: &FileTransferHeader,
    to: SessionId,
    outbox: &mut O,
    chunk_size: usize,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    O: Outbox + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent: u64 = 0;
    while sent < header.size {
        let want = std::cmp::min(buf.len() as u64, header.size - sent) as usize;
        let n = match src.read(&mut buf[..want]).await {
            Ok(0) => return Err(RelayError::ShortRead(sent)),
            Ok(n) => n,
            Err(e) => {
                warn!("reading {} failed: {}", header.filename, e);
                return Err(RelayError::ShortRead(sent));
            }
        };
        if outbox.send(to, buf[..n].to_vec()).is_err() {
            return Err(RelayError::WriteFailed(sent));
        }
        sent += n as u64;
    }
    Ok(())
}

// an upload in progress on the sender's connection, the input cursor does
// the counting, this just decides where the bytes go
#[derive(Debug)]
pub struct PayloadRelay {
    header: FileTransferHeader,
    target: Option<SessionId>,
    received: u64,
    failed: bool,
}

impl PayloadRelay {
    pub fn to(header: FileTransferHeader, target: SessionId) -> PayloadRelay {
        PayloadRelay {
            header,
            target: Some(target),
            received: 0,
            failed: false,
        }
    }

    /* nowhere to send it, but the bytes still have to be eaten */
    pub fn discard(header: FileTransferHeader) -> PayloadRelay {
        PayloadRelay {
            header,
            target: None,
            received: 0,
            failed: false,
        }
    }

    pub fn header(&self) -> &FileTransferHeader {
        &self.header
    }

    /* target only while it's still worth telling it anything */
    pub fn live_target(&self) -> Option<SessionId> {
        if self.failed {
            None
        } else {
            self.target
        }
    }

    /* returns true if this chunk is the one that found the target gone */
    pub fn forward<O: Outbox + ?Sized>(&mut self, chunk: Vec<u8>, outbox: &mut O) -> bool {
        self.received += chunk.len() as u64;
        match self.live_target() {
            Some(to) => {
                if outbox.send(to, chunk).is_err() {
                    self.failed = true;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn complete(&self) -> bool {
        self.live_target().is_some() && self.received == self.header.size
    }
}
