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
// this module contains the core data types and the handlers for chat
// commands, everything here runs on the dispatcher and only ever talks
// to sockets through the Outbox
pub mod command;
pub mod error;
pub mod message;
pub mod registry;
pub mod relay;
pub mod rules;

use crate::activity::ActivityLog;
use crate::buffer::{Frame, InputCursor};
use command::Command;
use error::Error;
use message::{Message, MsgType};
use registry::{Registry, RegistryError, SessionId};
use relay::{FileTransferHeader, PayloadRelay, RelayError};

use chrono::Local;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use std::{error as std_error, fmt};
use tokio::io::AsyncRead;

use log::{debug, info, warn};

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, PartialEq)]
pub struct Closed(pub SessionId);

impl std_error::Error for Closed {}
impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "connection {} is closed", self.0)
    }
}

/* where outbound bytes go, the server queues them on the socket writers,
 * tests just collect them */
pub trait Outbox {
    fn send(&mut self, to: SessionId, bytes: Vec<u8>) -> Result<(), Closed>;
    fn disconnect(&mut self, id: SessionId);
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub max_username_len: usize,
    pub max_message_len: usize,
    pub chunk_size: usize,
    pub line_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_username_len: 32,
            max_message_len: 1024,
            chunk_size: 4096,
            line_limit: 4096,
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::GroupExists(group) => Error::GroupExists(group),
            RegistryError::NoSuchGroup(group) => Error::NoSuchGroup(group),
            RegistryError::NotAdmin(_, group) => Error::NotAdmin(group),
            RegistryError::NotMember(user, group) => Error::NotMember(user, group),
            other => Error::Internal(other.to_string()),
        }
    }
}

// per connection framing state
struct Link {
    cursor: InputCursor,
    relay: Option<PayloadRelay>,
}

pub struct Core<O: Outbox> {
    pub registry: Registry,
    pub outbox: O,
    activity: Box<dyn ActivityLog + Send>,
    limits: Limits,
    links: HashMap<SessionId, Link>,
}

impl<O: Outbox> Core<O> {
    pub fn new(outbox: O, activity: Box<dyn ActivityLog + Send>, limits: Limits) -> Core<O> {
        Core {
            registry: Registry::new(),
            outbox,
            activity,
            limits,
            links: HashMap::new(),
        }
    }

    pub fn connected(&mut self) -> SessionId {
        let id = self.registry.register_connection();
        self.links.insert(
            id,
            Link {
                cursor: InputCursor::new(self.limits.line_limit),
                relay: None,
            },
        );
        id
    }

    pub fn is_connected(&self, id: SessionId) -> bool {
        self.links.contains_key(&id)
    }

    /* feed freshly read bytes through the session's cursor and act on
     * every complete line or payload chunk they make up */
    pub async fn received(&mut self, id: SessionId, bytes: &[u8]) {
        match self.links.get_mut(&id) {
            Some(link) => link.cursor.feed(bytes),
            None => return,
        }
        self.registry.touch(id, Instant::now());
        loop {
            let frame = match self.links.get_mut(&id) {
                Some(link) => link.cursor.next_frame(),
                None => return,
            };
            match frame {
                Ok(None) => return,
                Ok(Some(Frame::Line(line))) => self.line(id, &line).await,
                Ok(Some(Frame::Payload(chunk))) => self.payload(id, chunk),
                Ok(Some(Frame::PayloadEnd)) => self.payload_end(id),
                Err(e) => {
                    warn!("session {}: {}, dropping it", id, e);
                    self.send_error(id, Error::MessageTooLong(self.limits.line_limit));
                    self.disconnect(id);
                    return;
                }
            }
        }
    }

    /* close the connection and tear the session down */
    pub fn disconnect(&mut self, id: SessionId) {
        self.outbox.disconnect(id);
        self.disconnected(id);
    }

    /* the connection is already gone, just clean up after it */
    pub fn disconnected(&mut self, id: SessionId) {
        let link = match self.links.remove(&id) {
            Some(link) => link,
            None => return,
        };
        if let Some(relay) = link.relay {
            if let Some(to) = relay.live_target() {
                let err = Error::TransferInterrupted(relay.header().filename.clone());
                self.send_error(to, err);
            }
        }
        match self.registry.remove_session(id) {
            Some(name) => {
                info!("client disconnected: {} (session {})", name, id);
                self.activity
                    .log(&Message::new(MsgType::Leave, &name, "disconnected"));
            }
            None => debug!("session {} closed before logging in", id),
        }
    }

    pub fn sweep_idle(&mut self, now: Instant, timeout: Duration) {
        for id in self.registry.idle_sessions(now, timeout) {
            info!("session {} idle for {:?}, disconnecting", id, timeout);
            self.send_error(id, Error::Idle);
            self.disconnect(id);
        }
    }

    fn send_line(&mut self, to: SessionId, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        if let Err(e) = self.outbox.send(to, bytes) {
            debug!("dropped line: {}", e);
        }
    }

    fn send_error(&mut self, to: SessionId, err: Error) {
        self.send_line(to, &err.to_string());
    }

    async fn line(&mut self, id: SessionId, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        let too_long = line.len() > self.limits.max_message_len;
        let sender = match self.registry.username_of(id) {
            Some(name) => name.to_string(),
            None => {
                let res = if too_long {
                    Err(Error::MessageTooLong(self.limits.max_message_len))
                } else {
                    self.login(id, line)
                };
                if let Err(err) = res {
                    self.send_error(id, err);
                }
                return;
            }
        };

        let command = command::parse(line);
        if too_long {
            // an upload announced on a rejected line still owns the next
            // `size` bytes of the stream
            if let Command::SendFile {
                target,
                name,
                size: Some(size),
            } = &command
            {
                let header = FileTransferHeader::new(&sender, target, name, *size);
                self.expect_upload(id, PayloadRelay::discard(header), *size);
            }
            self.send_error(id, Error::MessageTooLong(self.limits.max_message_len));
            return;
        }

        let result = match command {
            Command::Help => {
                for help_line in rules::HELP {
                    self.send_line(id, help_line);
                }
                Ok(())
            }
            Command::WhoAmI => {
                self.send_line(id, &format!("You are {}.", sender));
                Ok(())
            }
            Command::ListOnline => {
                self.list_online(id);
                Ok(())
            }
            Command::PrivateMessage { target, text } => {
                self.private_message(id, &sender, &target, &text)
            }
            Command::CreateGroup(group) => self.create_group(id, &sender, &group),
            Command::AddMember { group, user } => self.add_member(id, &sender, &group, &user),
            Command::KickMember { group, user } => self.kick_member(id, &sender, &group, &user),
            Command::ListGroups => {
                self.list_groups(id, &sender);
                Ok(())
            }
            Command::GroupMessage { group, text } => self.group_message(id, &sender, &group, &text),
            Command::SendFile {
                target,
                name,
                size: Some(size),
            } => self.begin_upload(id, &sender, &target, &name, size),
            Command::SendFile {
                target,
                name,
                size: None,
            } => self.send_path(id, &sender, &target, &name).await,
            Command::Broadcast(text) => {
                self.broadcast(id, &sender, &text);
                Ok(())
            }
            Command::Malformed(keyword) => Err(Error::Usage(command::usage(keyword))),
        };

        if let Err(err) = result {
            debug!("{} -> {}", sender, err);
            self.send_error(id, err);
        }
    }

    /* first line of a connection: the username it wants. whoever holds the
     * name already is told and thrown out before the new owner is welcomed */
    fn login(&mut self, id: SessionId, name: &str) -> Result<(), Error> {
        if !rules::valid_username(name, self.limits.max_username_len) {
            return Err(Error::InvalidUsername(self.limits.max_username_len));
        }
        if let Some(old) = self.registry.claim_username(id, name)? {
            self.send_line(old, rules::EVICTED);
            self.disconnect(old);
            info!("session {} forcefully logged out for username {}", old, name);
        }
        info!("session {} set username to {}", id, name);
        self.activity
            .log(&Message::new(MsgType::Join, name, "logged in"));
        self.send_line(id, &format!("Welcome, {}!", name));
        Ok(())
    }

    fn list_online(&mut self, id: SessionId) {
        let mut lines = vec![String::from("Users:")];
        for (name, status) in self.registry.list_online() {
            lines.push(format!("  {}: {}", name, status));
        }
        for line in lines.iter() {
            self.send_line(id, line);
        }
    }

    fn private_message(
        &mut self,
        id: SessionId,
        sender: &str,
        target: &str,
        text: &str,
    ) -> Result<(), Error> {
        if target == sender {
            return Err(Error::MessageSelf);
        }
        let to = self
            .registry
            .lookup_by_username(target)
            .ok_or_else(|| Error::NoSuchUser(target.to_string()))?;
        self.send_line(to, &format!("[Private] {}: {}", sender, text));
        self.send_line(id, &format!("[Private to {}] {}", target, text));
        self.activity.log(&Message::new(
            MsgType::Private,
            sender,
            &format!("{}: {}", target, text),
        ));
        Ok(())
    }

    fn create_group(&mut self, id: SessionId, sender: &str, group: &str) -> Result<(), Error> {
        if !rules::valid_group_name(group, self.limits.max_username_len) {
            return Err(Error::InvalidGroupName(self.limits.max_username_len));
        }
        self.registry.create_group(group, sender)?;
        info!("{} created group {}", sender, group);
        self.send_line(id, &format!("Group '{}' created.", group));
        Ok(())
    }

    fn add_member(
        &mut self,
        id: SessionId,
        sender: &str,
        group: &str,
        user: &str,
    ) -> Result<(), Error> {
        self.registry.add_member(group, sender, user)?;
        self.send_line(id, &format!("Added {} to group '{}'.", user, group));
        if user != sender {
            if let Some(to) = self.registry.lookup_by_username(user) {
                self.send_line(
                    to,
                    &format!("You have been added to group '{}' by {}.", group, sender),
                );
            }
        }
        Ok(())
    }

    fn kick_member(
        &mut self,
        id: SessionId,
        sender: &str,
        group: &str,
        user: &str,
    ) -> Result<(), Error> {
        self.registry.remove_member(group, sender, user)?;
        self.send_line(id, &format!("Removed {} from group '{}'.", user, group));
        if user != sender {
            if let Some(to) = self.registry.lookup_by_username(user) {
                self.send_line(
                    to,
                    &format!("You have been removed from group '{}' by {}.", group, sender),
                );
            }
        }
        Ok(())
    }

    fn list_groups(&mut self, id: SessionId, sender: &str) {
        let lines: Vec<String> = self
            .registry
            .groups_containing(sender)
            .into_iter()
            .map(|(name, group)| {
                format!(
                    "Group {} - admins: {} - members: {}",
                    name,
                    group.admins().collect::<Vec<_>>().join(", "),
                    group.members().collect::<Vec<_>>().join(", ")
                )
            })
            .collect();
        if lines.is_empty() {
            self.send_line(id, "You are not in any groups.");
        }
        for line in lines.iter() {
            self.send_line(id, line);
        }
    }

    /* goes to every member with a live session except the sender, who
     * gets exactly one echo of the same line */
    fn group_message(
        &mut self,
        id: SessionId,
        sender: &str,
        group: &str,
        text: &str,
    ) -> Result<(), Error> {
        let members = self
            .registry
            .members_of(group)
            .ok_or_else(|| Error::NoSuchGroup(group.to_string()))?;
        if !self.registry.is_member(group, sender) {
            return Err(Error::NotInGroup(group.to_string()));
        }
        let line = format!("[Group {}] {}: {}", group, sender, text);
        for member in members.iter().filter(|m| *m != sender) {
            if let Some(to) = self.registry.lookup_by_username(member) {
                self.send_line(to, &line);
            }
        }
        self.send_line(id, &line);
        self.activity.log(&Message::new(
            MsgType::Group,
            sender,
            &format!("{}: {}", group, text),
        ));
        Ok(())
    }

    fn broadcast(&mut self, id: SessionId, sender: &str, text: &str) {
        let line = format!("{}: {}", sender, text);
        for (to, _) in self.registry.authenticated() {
            if to != id {
                self.send_line(to, &line);
            }
        }
        self.activity.log(&Message::new(MsgType::Text, sender, text));
    }

    fn file_target(&self, sender: &str, target: &str) -> Result<SessionId, Error> {
        if target == sender {
            return Err(Error::FileSelf);
        }
        self.registry
            .lookup_by_username(target)
            .ok_or_else(|| Error::NoSuchUser(target.to_string()))
    }

    fn transfer_done(&mut self, id: SessionId, to: SessionId, header: &FileTransferHeader) {
        info!(
            "file {} ({} bytes) sent from {} to {}",
            header.filename, header.size, header.sender, header.target
        );
        self.send_line(
            id,
            &format!(
                "File '{}' sent to {} ({} bytes).",
                header.filename, header.target, header.size
            ),
        );
        self.send_line(
            to,
            &format!(
                "File '{}' from {} received ({} bytes).",
                header.filename, header.sender, header.size
            ),
        );
        self.activity.log(&Message::new(
            MsgType::File,
            &header.sender,
            &format!("{} -> {} ({} bytes)", header.filename, header.target, header.size),
        ));
    }

    /* path mode: the file lives on the server, we stream all of it to the
     * target right now, nothing else on this loop runs until it's done */
    async fn send_path(
        &mut self,
        id: SessionId,
        sender: &str,
        target: &str,
        path: &str,
    ) -> Result<(), Error> {
        let to = self.file_target(sender, target)?;
        let unavailable = || Error::FileUnavailable(path.to_string());
        let meta = tokio::fs::metadata(path).await.map_err(|_| unavailable())?;
        if !meta.is_file() {
            return Err(unavailable());
        }
        let mut file = tokio::fs::File::open(path).await.map_err(|_| unavailable())?;

        let header = FileTransferHeader::new(sender, target, path, meta.len());
        self.stream_to(id, to, &header, &mut file).await
    }

    async fn stream_to<R: AsyncRead + Unpin>(
        &mut self,
        id: SessionId,
        to: SessionId,
        header: &FileTransferHeader,
        src: &mut R,
    ) -> Result<(), Error> {
        self.send_line(to, &header.notice());
        let chunk_size = self.limits.chunk_size;
        match relay::stream(src, header, to, &mut self.outbox, chunk_size).await {
            Ok(()) => {
                self.transfer_done(id, to, header);
                Ok(())
            }
            Err(RelayError::ShortRead(sent)) => {
                warn!("{}: {}", header.filename, RelayError::ShortRead(sent));
                let err = Error::TransferIncomplete(header.filename.clone(), sent, header.size);
                self.send_error(to, err.clone());
                Err(err)
            }
            Err(e) => {
                warn!("{}: {}", header.filename, e);
                Err(Error::TransferInterrupted(header.filename.clone()))
            }
        }
    }

    /* relay mode: the next `size` bytes on this connection are the file,
     * the cursor switches to counting and the payload is forwarded as it
     * arrives. if there's no valid target the payload is still consumed */
    fn begin_upload(
        &mut self,
        id: SessionId,
        sender: &str,
        target: &str,
        name: &str,
        size: u64,
    ) -> Result<(), Error> {
        let header = FileTransferHeader::new(sender, target, name, size);
        let resolved = self.file_target(sender, target);
        let relay = match resolved {
            Ok(to) => {
                self.send_line(to, &header.notice());
                PayloadRelay::to(header, to)
            }
            Err(_) => PayloadRelay::discard(header),
        };
        self.expect_upload(id, relay, size);
        resolved.map(|_| ())
    }

    fn expect_upload(&mut self, id: SessionId, relay: PayloadRelay, size: u64) {
        if let Some(link) = self.links.get_mut(&id) {
            link.cursor.expect_exact(size);
            link.relay = Some(relay);
        }
    }

    fn payload(&mut self, id: SessionId, chunk: Vec<u8>) {
        let link = match self.links.get_mut(&id) {
            Some(link) => link,
            None => return,
        };
        let lost = match link.relay.as_mut() {
            Some(relay) => {
                if relay.forward(chunk, &mut self.outbox) {
                    Some(relay.header().filename.clone())
                } else {
                    None
                }
            }
            None => None,
        };
        if let Some(filename) = lost {
            warn!("upload of {} lost its target", filename);
            self.send_error(id, Error::TransferInterrupted(filename));
        }
    }

    fn payload_end(&mut self, id: SessionId) {
        let relay = match self.links.get_mut(&id).and_then(|link| link.relay.take()) {
            Some(relay) => relay,
            None => return,
        };
        if relay.complete() {
            if let Some(to) = relay.live_target() {
                self.transfer_done(id, to, relay.header());
            }
        }
    }
}
