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
// activity records: "<type>|<sender>|<content>"
// only the first two '|' are delimiters, content is free to contain more
use std::{error, fmt};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MsgType {
    Text = 0,
    Join = 1,
    Leave = 2,
    Private = 3,
    Group = 4,
    File = 5,
}

impl MsgType {
    fn from_code(code: u8) -> Option<MsgType> {
        match code {
            0 => Some(MsgType::Text),
            1 => Some(MsgType::Join),
            2 => Some(MsgType::Leave),
            3 => Some(MsgType::Private),
            4 => Some(MsgType::Group),
            5 => Some(MsgType::File),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum RecordError {
    MissingField,
    InvalidType(String),
}

impl error::Error for RecordError {}
impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::MissingField => write!(f, "record needs type|sender|content"),
            RecordError::InvalidType(t) => write!(f, "unknown record type: {}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub msg_type: MsgType,
    pub sender: String,
    pub content: String,
}

impl Message {
    pub fn new(msg_type: MsgType, sender: &str, content: &str) -> Message {
        Message {
            msg_type,
            sender: sender.to_string(),
            content: content.to_string(),
        }
    }

    pub fn serialize(&self) -> String {
        format!("{}|{}|{}", self.msg_type as u8, self.sender, self.content)
    }

    pub fn deserialize(raw: &str) -> Result<Message, RecordError> {
        let mut fields = raw.splitn(3, '|');
        let type_str = fields.next().ok_or(RecordError::MissingField)?;
        let sender = fields.next().ok_or(RecordError::MissingField)?;
        let content = fields.next().ok_or(RecordError::MissingField)?;
        let msg_type = type_str
            .parse::<u8>()
            .ok()
            .and_then(MsgType::from_code)
            .ok_or_else(|| RecordError::InvalidType(type_str.to_string()))?;
        Ok(Message::new(msg_type, sender, content))
    }
}
