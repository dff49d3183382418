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
// rules
// checks to make sure usernames and group names are composed of valid
// characters, plus the fixed texts of the protocol

// '|' is the field delimiter of activity log records, so it can't show up
// in any name that ends up as a record's sender
const NOT_NAME: &str = "\0\r\n|";

fn matches_disallowed(msg: &str, disallowed: &str) -> bool {
    msg.chars().any(|c| disallowed.contains(c))
}

pub fn valid_username(name: &str, max_len: usize) -> bool {
    !name.is_empty()
        && name.len() <= max_len
        && !name.starts_with('/')
        && !name.chars().any(char::is_whitespace)
        && !matches_disallowed(name, NOT_NAME)
}

pub fn valid_group_name(name: &str, max_len: usize) -> bool {
    !name.is_empty() && name.len() <= max_len && !matches_disallowed(name, NOT_NAME)
}

pub const EVICTED: &str = "You have been logged out because the same username logged in elsewhere.";

pub const HELP: &[&str] = &[
    "Available commands:",
    "  /help                          show this help",
    "  /whoami                        show your username",
    "  /list                          list users and their status",
    "  /msg <user> <message>          send a private message",
    "  /creategroup <group>           create a group, you become its admin",
    "  /addmember <group> <user>      add a user to a group (admins only)",
    "  /kickmember <group> <user>     remove a user from a group (admins only)",
    "  /listgroups                    list the groups you are in",
    "  /gmsg <group> <message>        send a message to a group",
    "  /sendfile <user> <path>        send a file from the server's disk",
    "  /sendfile <user> <name> <size> upload <size> raw bytes after this line",
    "Anything else is broadcast to everyone online.",
];
