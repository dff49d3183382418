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
use std::convert::Infallible;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    WhoAmI,
    ListOnline,
    PrivateMessage { target: String, text: String },
    CreateGroup(String),
    AddMember { group: String, user: String },
    KickMember { group: String, user: String },
    ListGroups,
    GroupMessage { group: String, text: String },
    SendFile { target: String, name: String, size: Option<u64> },
    Broadcast(String),
    Malformed(&'static str),
}

pub fn usage(keyword: &str) -> &'static str {
    match keyword {
        "/msg" => "/msg <user> <message>",
        "/creategroup" => "/creategroup <group>",
        "/addmember" => "/addmember <group> <user>",
        "/kickmember" => "/kickmember <group> <user>",
        "/gmsg" => "/gmsg <group> <message>",
        "/sendfile" => "/sendfile <user> <path> | /sendfile <user> <name> <size>",
        _ => "/help",
    }
}

// snatches up a word and returns it along with the rest of the string,
// minus the whitespace run that separated them
fn split_arg(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

// pulls exactly n whitespace separated args, anything left over is an error
fn fixed_args(s: &str, n: usize) -> Option<Vec<&str>> {
    let args: Vec<&str> = s.split_whitespace().collect();
    if args.len() == n {
        Some(args)
    } else {
        None
    }
}

impl FromStr for Command {
    type Err = Infallible;

    /* the line is expected to be trimmed already, anything that doesn't
     * start with one of our keywords is plain chat */
    fn from_str(line: &str) -> Result<Command, Self::Err> {
        let (keyword, rest) = split_arg(line);
        let cmd = match keyword {
            "/help" => Command::Help,
            "/whoami" => Command::WhoAmI,
            "/list" => Command::ListOnline,
            "/listgroups" => Command::ListGroups,
            "/msg" => {
                let (target, text) = split_arg(rest);
                if target.is_empty() || text.is_empty() {
                    Command::Malformed("/msg")
                } else {
                    Command::PrivateMessage {
                        target: target.to_string(),
                        text: text.to_string(),
                    }
                }
            }
            "/gmsg" => {
                let (group, text) = split_arg(rest);
                if group.is_empty() || text.is_empty() {
                    Command::Malformed("/gmsg")
                } else {
                    Command::GroupMessage {
                        group: group.to_string(),
                        text: text.to_string(),
                    }
                }
            }
            "/creategroup" => match fixed_args(rest, 1) {
                Some(args) => Command::CreateGroup(args[0].to_string()),
                None => Command::Malformed("/creategroup"),
            },
            "/addmember" => match fixed_args(rest, 2) {
                Some(args) => Command::AddMember {
                    group: args[0].to_string(),
                    user: args[1].to_string(),
                },
                None => Command::Malformed("/addmember"),
            },
            "/kickmember" => match fixed_args(rest, 2) {
                Some(args) => Command::KickMember {
                    group: args[0].to_string(),
                    user: args[1].to_string(),
                },
                None => Command::Malformed("/kickmember"),
            },
            "/sendfile" => parse_sendfile(rest),
            _ => Command::Broadcast(line.to_string()),
        };
        Ok(cmd)
    }
}

fn parse_sendfile(rest: &str) -> Command {
    let args: Vec<&str> = rest.split_whitespace().collect();
    let size = match args.len() {
        2 => None,
        3 => match args[2].parse::<u64>() {
            Ok(size) => Some(size),
            Err(_) => return Command::Malformed("/sendfile"),
        },
        _ => return Command::Malformed("/sendfile"),
    };
    Command::SendFile {
        target: args[0].to_string(),
        name: args[1].to_string(),
        size,
    }
}

pub fn parse(line: &str) -> Command {
    match line.parse() {
        Ok(cmd) => cmd,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse("/help"), Command::Help);
        assert_eq!(parse("/whoami"), Command::WhoAmI);
        assert_eq!(parse("/list"), Command::ListOnline);
        assert_eq!(parse("/listgroups"), Command::ListGroups);
        // extra words are ignored for commands without arguments
        assert_eq!(parse("/whoami please"), Command::WhoAmI);
    }

    #[test]
    fn msg_keeps_remainder_verbatim() {
        assert_eq!(
            parse("/msg bob  hello   there  friend"),
            Command::PrivateMessage {
                target: "bob".into(),
                text: "hello   there  friend".into()
            }
        );
        assert_eq!(parse("/msg bob"), Command::Malformed("/msg"));
        assert_eq!(parse("/msg"), Command::Malformed("/msg"));
    }

    #[test]
    fn gmsg() {
        assert_eq!(
            parse("/gmsg team hi all"),
            Command::GroupMessage {
                group: "team".into(),
                text: "hi all".into()
            }
        );
        assert_eq!(parse("/gmsg team"), Command::Malformed("/gmsg"));
    }

    #[test]
    fn group_management() {
        assert_eq!(parse("/creategroup team"), Command::CreateGroup("team".into()));
        assert_eq!(parse("/creategroup my team"), Command::Malformed("/creategroup"));
        assert_eq!(
            parse("/addmember team bob"),
            Command::AddMember {
                group: "team".into(),
                user: "bob".into()
            }
        );
        assert_eq!(parse("/addmember team"), Command::Malformed("/addmember"));
        assert_eq!(
            parse("/kickmember team\tbob"),
            Command::KickMember {
                group: "team".into(),
                user: "bob".into()
            }
        );
    }

    #[test]
    fn sendfile_modes() {
        assert_eq!(
            parse("/sendfile bob /tmp/notes.txt"),
            Command::SendFile {
                target: "bob".into(),
                name: "/tmp/notes.txt".into(),
                size: None
            }
        );
        assert_eq!(
            parse("/sendfile bob notes.txt 1024"),
            Command::SendFile {
                target: "bob".into(),
                name: "notes.txt".into(),
                size: Some(1024)
            }
        );
        assert_eq!(parse("/sendfile bob notes.txt big"), Command::Malformed("/sendfile"));
        assert_eq!(parse("/sendfile bob"), Command::Malformed("/sendfile"));
    }

    #[test]
    fn keywords_are_case_sensitive_exact_tokens() {
        assert_eq!(parse("/MSG bob hi"), Command::Broadcast("/MSG bob hi".into()));
        assert_eq!(parse("/helpme"), Command::Broadcast("/helpme".into()));
        assert_eq!(parse("hello world"), Command::Broadcast("hello world".into()));
    }
}
