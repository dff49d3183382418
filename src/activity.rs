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
// activity log
// an append-only record of who connected, left, talked and sent files
use crate::chat::message::Message;
use crate::chat::timestamp;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

pub trait ActivityLog {
    fn log(&mut self, record: &Message);
}

#[derive(Debug)]
pub struct FileActivityLog {
    path: PathBuf,
    file: File,
}

impl FileActivityLog {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileActivityLog> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(FileActivityLog {
            path: path.as_ref().to_path_buf(),
            file,
        })
    }
}

impl ActivityLog for FileActivityLog {
    /* a log we can't write to is the operator's problem, never a client's */
    fn log(&mut self, record: &Message) {
        let line = record.serialize();
        debug!(target: "activity", "{}", line);
        if let Err(e) = writeln!(self.file, "{} {}", timestamp(), line) {
            warn!("couldn't write to {}: {}", self.path.display(), e);
        }
    }
}

// keeps everything in memory, handy when nothing should touch the disk
impl ActivityLog for Vec<Message> {
    fn log(&mut self, record: &Message) {
        self.push(record.clone());
    }
}
