/* rusty-chatd - a chat server written in Rust
*  Copyright (C) Joanna Janet Zaitseva-Doyle <jjadoyle@gmail.com>

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
use std::{error, fmt};

// every protocol error is reported back to the client as one line,
// Display gives the exact wire text including the "Error: " tag
impl error::Error for Error {}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Usage(usage) => write!(f, "Error: Usage: {}", usage),
            Error::InvalidUsername(max) => write!(
                f,
                "Error: Invalid username (1-{} characters, no spaces, '|' or leading '/').",
                max
            ),
            Error::MessageTooLong(max) => write!(f, "Error: Message too long (max {} bytes).", max),
            Error::MessageSelf => write!(f, "Error: You cannot message yourself."),
            Error::NoSuchUser(user) => write!(f, "Error: User '{}' not found.", user),
            Error::GroupExists(group) => write!(f, "Error: Group '{}' already exists.", group),
            Error::NoSuchGroup(group) => write!(f, "Error: Group '{}' not found.", group),
            Error::NotAdmin(group) => write!(f, "Error: You are not an admin of group '{}'.", group),
            Error::NotMember(user, group) => {
                write!(f, "Error: '{}' is not a member of group '{}'.", user, group)
            }
            Error::NotInGroup(group) => write!(f, "Error: You are not a member of group '{}'.", group),
            Error::FileSelf => write!(f, "Error: You cannot send a file to yourself."),
            Error::FileUnavailable(path) => write!(f, "Error: Cannot open file '{}'.", path),
            Error::TransferIncomplete(name, sent, size) => write!(
                f,
                "Error: File transfer of '{}' incomplete ({}/{} bytes).",
                name, sent, size
            ),
            Error::TransferInterrupted(name) => {
                write!(f, "Error: File transfer of '{}' interrupted.", name)
            }
            Error::InvalidGroupName(max) => {
                write!(f, "Error: Invalid group name (1-{} characters, no '|').", max)
            }
            Error::Idle => write!(f, "Error: Disconnected due to inactivity."),
            Error::Internal(what) => write!(f, "Error: Internal error ({}).", what),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Usage(&'static str),
    InvalidUsername(usize),
    MessageTooLong(usize),
    MessageSelf,
    NoSuchUser(String),
    GroupExists(String),
    NoSuchGroup(String),
    NotAdmin(String),
    NotMember(String, String),
    NotInGroup(String),
    FileSelf,
    FileUnavailable(String),
    TransferIncomplete(String, u64, u64),
    TransferInterrupted(String),
    InvalidGroupName(usize),
    Idle,
    Internal(String),
}
