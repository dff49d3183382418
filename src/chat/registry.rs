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
use crate::chat::timestamp;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use std::{error, fmt};

use log::debug;

pub type SessionId = u64;

#[derive(Debug, PartialEq)]
pub enum RegistryError {
    UnknownSession(SessionId),
    AlreadyClaimed(String),
    GroupExists(String),
    NoSuchGroup(String),
    NotAdmin(String, String),
    NotMember(String, String),
}

impl error::Error for RegistryError {}
impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryError::UnknownSession(id) => write!(f, "no session {}", id),
            RegistryError::AlreadyClaimed(name) => write!(f, "session is already {}", name),
            RegistryError::GroupExists(group) => write!(f, "group {} exists", group),
            RegistryError::NoSuchGroup(group) => write!(f, "no group {}", group),
            RegistryError::NotAdmin(user, group) => write!(f, "{} is not admin of {}", user, group),
            RegistryError::NotMember(user, group) => write!(f, "{} is not in {}", user, group),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    username: Option<String>,
    last_activity: Instant,
}

impl Session {
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}

#[derive(Debug, Default)]
pub struct Group {
    members: BTreeSet<String>,
    admins: BTreeSet<String>,
}

impl Group {
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn admins(&self) -> impl Iterator<Item = &str> {
        self.admins.iter().map(String::as_str)
    }
}

// the registry is owned by the dispatcher, which is the only thing
// that ever touches it, so there's no locking in here
#[derive(Debug)]
pub struct Registry {
    id_counter: SessionId,
    sessions: HashMap<SessionId, Session>,
    by_name: HashMap<String, SessionId>,
    // status records outlive sessions so /list can show who left and when
    statuses: BTreeMap<String, String>,
    groups: BTreeMap<String, Group>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            id_counter: 1,
            sessions: HashMap::new(),
            by_name: HashMap::new(),
            statuses: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    pub fn register_connection(&mut self) -> SessionId {
        let id = self.id_counter;
        self.id_counter += 1;
        self.sessions.insert(
            id,
            Session {
                username: None,
                last_activity: Instant::now(),
            },
        );
        id
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /* last login wins: if the name is held by another live session, that
     * session loses the name in this same call and its id is handed back,
     * the caller has to tell it and close it */
    pub fn claim_username(
        &mut self,
        id: SessionId,
        name: &str,
    ) -> Result<Option<SessionId>, RegistryError> {
        match self.sessions.get(&id) {
            None => return Err(RegistryError::UnknownSession(id)),
            Some(Session {
                username: Some(held),
                ..
            }) => return Err(RegistryError::AlreadyClaimed(held.clone())),
            Some(_) => (),
        }

        let evicted = self.by_name.insert(name.to_string(), id);
        if let Some(old_id) = evicted {
            if let Some(old) = self.sessions.get_mut(&old_id) {
                old.username = None;
            }
            debug!("session {} takes {} over from session {}", id, name, old_id);
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.username = Some(name.to_string());
        }
        self.statuses
            .insert(name.to_string(), format!("online since {}", timestamp()));
        Ok(evicted)
    }

    pub fn lookup_by_username(&self, name: &str) -> Option<SessionId> {
        self.by_name.get(name).copied()
    }

    pub fn username_of(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id).and_then(Session::username)
    }

    pub fn set_status(&mut self, id: SessionId, text: &str) {
        if let Some(name) = self.username_of(id).map(str::to_string) {
            self.statuses.insert(name, text.to_string());
        }
    }

    pub fn list_online(&self) -> Vec<(String, String)> {
        self.statuses
            .iter()
            .map(|(name, status)| (name.clone(), status.clone()))
            .collect()
    }

    /* (id, username) of every authenticated session, ordered by name */
    pub fn authenticated(&self) -> Vec<(SessionId, String)> {
        let mut ret: Vec<(SessionId, String)> = self
            .by_name
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        ret.sort_by(|a, b| a.1.cmp(&b.1));
        ret
    }

    /* returns the username the session held, if it still held one */
    pub fn remove_session(&mut self, id: SessionId) -> Option<String> {
        let session = self.sessions.remove(&id)?;
        let name = session.username?;
        if self.by_name.get(&name) == Some(&id) {
            self.by_name.remove(&name);
            self.statuses
                .insert(name.clone(), format!("offline since {}", timestamp()));
        }
        Some(name)
    }

    pub fn touch(&mut self, id: SessionId, now: Instant) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.last_activity = now;
        }
    }

    pub fn idle_sessions(&self, now: Instant, timeout: Duration) -> Vec<SessionId> {
        let mut ret: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        ret.sort_unstable();
        ret
    }

    pub fn create_group(&mut self, name: &str, creator: &str) -> Result<(), RegistryError> {
        if self.groups.contains_key(name) {
            return Err(RegistryError::GroupExists(name.to_string()));
        }
        let mut group = Group::default();
        group.members.insert(creator.to_string());
        group.admins.insert(creator.to_string());
        self.groups.insert(name.to_string(), group);
        Ok(())
    }

    fn admin_group(&mut self, group: &str, acting: &str) -> Result<&mut Group, RegistryError> {
        let entry = self
            .groups
            .get_mut(group)
            .ok_or_else(|| RegistryError::NoSuchGroup(group.to_string()))?;
        if !entry.admins.contains(acting) {
            return Err(RegistryError::NotAdmin(acting.to_string(), group.to_string()));
        }
        Ok(entry)
    }

    // adding someone who is already a member is fine, sets don't mind
    pub fn add_member(&mut self, group: &str, acting: &str, new: &str) -> Result<(), RegistryError> {
        self.admin_group(group, acting)?.members.insert(new.to_string());
        Ok(())
    }

    pub fn remove_member(
        &mut self,
        group: &str,
        acting: &str,
        target: &str,
    ) -> Result<(), RegistryError> {
        let entry = self.admin_group(group, acting)?;
        if !entry.members.remove(target) {
            return Err(RegistryError::NotMember(target.to_string(), group.to_string()));
        }
        entry.admins.remove(target);
        Ok(())
    }

    pub fn group_exists(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn is_member(&self, group: &str, user: &str) -> bool {
        self.groups
            .get(group)
            .map_or(false, |g| g.members.contains(user))
    }

    pub fn is_admin(&self, group: &str, user: &str) -> bool {
        self.groups
            .get(group)
            .map_or(false, |g| g.admins.contains(user))
    }

    pub fn members_of(&self, group: &str) -> Option<Vec<String>> {
        self.groups
            .get(group)
            .map(|g| g.members.iter().cloned().collect())
    }

    pub fn groups_containing(&self, user: &str) -> Vec<(&str, &Group)> {
        self.groups
            .iter()
            .filter(|(_, g)| g.members.contains(user))
            .map(|(name, g)| (name.as_str(), g))
            .collect()
    }
}
