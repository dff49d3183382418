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
// this module contains the input cursor for client connections, sitting
// between the bytes read off a socket and the protocol handlers
// the stream is mostly newline-delimited text, but a file upload is a raw
// run of bytes whose length was announced in the preceding command line,
// so the cursor has to know which of the two it is currently reading
use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq)]
pub enum BufferError {
    Overflow(usize),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Overflow(max) => write!(f, "no line delimiter within {} bytes", max),
        }
    }
}

impl Error for BufferError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Lines,
    Exact(u64),
}

#[derive(Debug, PartialEq)]
pub enum Frame {
    Line(String),
    Payload(Vec<u8>),
    PayloadEnd,
}

#[derive(Debug)]
pub struct InputCursor {
    buffer: Vec<u8>,
    mode: Mode,
    max_line: usize,
}

impl InputCursor {
    pub fn new(max_line: usize) -> InputCursor {
        InputCursor {
            buffer: Vec::new(),
            mode: Mode::Lines,
            max_line,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /* switch to counting mode, whatever is already buffered past the
     * last extracted line becomes the start of the payload */
    pub fn expect_exact(&mut self, count: u64) {
        self.mode = Mode::Exact(count);
    }

    fn get_eol(&self) -> Option<usize> {
        self.buffer.iter().position(|&b| b == b'\n')
    }

    // strips the LF and a CR in front of it, if any
    fn extract_ln(&mut self) -> Option<String> {
        let i = self.get_eol()?;
        let mut line: Vec<u8> = self.buffer.drain(..=i).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).to_string())
    }

    /* Ok(None) means we need more bytes before anything can be produced,
     * in line mode an over-long line with no LF in sight is an error, the
     * caller is expected to drop the connection */
    pub fn next_frame(&mut self) -> Result<Option<Frame>, BufferError> {
        match self.mode {
            Mode::Exact(0) => {
                self.mode = Mode::Lines;
                Ok(Some(Frame::PayloadEnd))
            }
            Mode::Exact(remaining) => {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let take = if (self.buffer.len() as u64) < remaining {
                    self.buffer.len()
                } else {
                    remaining as usize
                };
                let chunk: Vec<u8> = self.buffer.drain(..take).collect();
                self.mode = Mode::Exact(remaining - take as u64);
                Ok(Some(Frame::Payload(chunk)))
            }
            Mode::Lines => match self.extract_ln() {
                Some(line) => Ok(Some(Frame::Line(line))),
                None if self.buffer.len() > self.max_line => {
                    Err(BufferError::Overflow(self.max_line))
                }
                None => Ok(None),
            },
        }
    }
}
