// shared by the integration tests: an Outbox that just remembers
#![allow(dead_code)]
use rusty_chatd::chat::message::Message;
use rusty_chatd::chat::registry::SessionId;
use rusty_chatd::chat::{Closed, Core, Limits, Outbox};

use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct Mailbox {
    pub inbox: HashMap<SessionId, Vec<u8>>,
    pub closed: HashSet<SessionId>,
}

impl Outbox for Mailbox {
    fn send(&mut self, to: SessionId, bytes: Vec<u8>) -> Result<(), Closed> {
        if self.closed.contains(&to) {
            return Err(Closed(to));
        }
        self.inbox.entry(to).or_insert_with(Vec::new).extend(bytes);
        Ok(())
    }

    fn disconnect(&mut self, id: SessionId) {
        self.closed.insert(id);
    }
}

impl Mailbox {
    pub fn take_bytes(&mut self, id: SessionId) -> Vec<u8> {
        self.inbox.remove(&id).unwrap_or_default()
    }

    /* everything queued for id so far, as lines, and forget it */
    pub fn take(&mut self, id: SessionId) -> Vec<String> {
        String::from_utf8_lossy(&self.take_bytes(id))
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn core() -> Core<Mailbox> {
    core_with(Limits::default())
}

pub fn core_with(limits: Limits) -> Core<Mailbox> {
    Core::new(Mailbox::default(), Box::new(Vec::<Message>::new()), limits)
}

pub async fn send(core: &mut Core<Mailbox>, id: SessionId, line: &str) {
    core.received(id, format!("{}\n", line).as_bytes()).await;
}

/* connects and claims a name, swallowing the welcome */
pub async fn login(core: &mut Core<Mailbox>, name: &str) -> SessionId {
    let id = core.connected();
    send(core, id, name).await;
    assert_eq!(core.outbox.take(id), vec![format!("Welcome, {}!", name)]);
    id
}
