//! The TCP line-protocol codec.
//!
//! A request is a single read of at most [`MAX_REQUEST_SIZE`] bytes:
//!
//! ```text
//! REQ <command>( <len> <argument>)*
//! ```
//!
//! Each argument is preceded by its length. A positive length consumes
//! exactly that many bytes, so an argument may contain whitespace. A negative
//! length asks the decoder to consume bytes up to the next whitespace. A
//! token which is not a length at all is taken as a whitespace-delimited
//! argument too.
//!
//! Replies are `REP <len> <data>\n`, or `REP 0\n` when there is no data.
//! Errors are `ERR <code> <len> <message>\n`.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::reply::Reply;

/// Maximum size of a request, which must arrive within a single read.
pub const MAX_REQUEST_SIZE: usize = 4096;

const REQUEST_PREFIX: &[u8] = b"REQ ";
const REPLY_PREFIX: &str = "REP";
const ERROR_PREFIX: &str = "ERR";
const BYE_COMMAND: &[u8] = b"BYE";
const QUIT_COMMAND: &[u8] = b"QUIT";

// Sent whenever the reply buffer itself cannot be allocated.
const OUT_OF_MEMORY_LINE: &[u8] = b"ERR 12 38 Not enough memory. Please retry later.\n";

// Same set of characters as C `isspace`.
const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

fn starts_with_ignore_case(input: &[u8], prefix: &[u8]) -> bool {
    input.len() >= prefix.len() && input[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn count_word(count: usize) -> String {
    match count {
        1 => "one".into(),
        2 => "two".into(),
        3 => "three".into(),
        n => n.to_string(),
    }
}

/// The ordered arguments of a request.
///
/// Each argument is a byte string of known length, possibly empty and
/// possibly containing `NUL` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Arguments(Vec<Bytes>);

impl Arguments {
    /// Creates empty [`Arguments`].
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an argument.
    #[inline]
    pub fn push(&mut self, argument: impl Into<Bytes>) {
        self.0.push(argument.into());
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.0.get(index)
    }

    /// Returns an iterator over the arguments.
    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.0.iter()
    }

    /// Returns the argument at `index` as text.
    ///
    /// # Errors
    ///
    /// Fails when the argument is missing or is not valid `UTF-8`.
    pub fn text(&self, index: usize) -> Result<&str> {
        let argument = self
            .0
            .get(index)
            .ok_or_else(|| Error::invalid_argument(format!("Missing argument {}.", index + 1)))?;

        std::str::from_utf8(argument).map_err(|_| {
            Error::invalid_argument(format!("Argument {} is not valid UTF-8.", index + 1))
        })
    }

    /// Checks that `command` received exactly `count` arguments.
    ///
    /// # Errors
    ///
    /// Fails with an [`crate::error::ErrorKind::InvalidArgument`] error
    /// describing the mismatch.
    pub fn expect(&self, command: &str, count: usize) -> Result<()> {
        let received = self.0.len();
        if received == count {
            return Ok(());
        }

        let description = match (count, received < count) {
            (0, _) => format!("{command} doesn't take any argument."),
            (1, true) => format!("{command} needs an argument."),
            (1, false) => format!("{command} takes only one argument."),
            (n, true) => format!("{command} needs {} arguments.", count_word(n)),
            (n, false) => format!("{command} takes only {} arguments.", count_word(n)),
        };

        Err(Error::invalid_argument(description))
    }
}

impl From<Vec<Bytes>> for Arguments {
    fn from(arguments: Vec<Bytes>) -> Self {
        Self(arguments)
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Bytes;
    type IntoIter = std::slice::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A parsed request: a command name and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: String,
    arguments: Arguments,
}

impl Frame {
    /// Creates a [`Frame`].
    #[must_use]
    #[inline]
    pub fn new(command: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            command: command.into(),
            arguments,
        }
    }

    /// Returns the command name.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Consumes the frame returning its command name and arguments.
    #[must_use]
    pub fn into_parts(self) -> (String, Arguments) {
        (self.command, self.arguments)
    }
}

/// A decoded TCP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A command to dispatch.
    Frame(Frame),
    /// The client ends the session with `BYE` or `QUIT`.
    Close,
}

// A read position over a request buffer.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8], pos: usize) -> Self {
        Self { input, pos }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_spaces(&mut self) {
        while self.input.get(self.pos).is_some_and(|byte| is_space(*byte)) {
            self.pos += 1;
        }
    }

    // Consumes bytes up to the next whitespace or the end of input.
    fn token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.input.get(self.pos).is_some_and(|byte| !is_space(*byte)) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    // Consumes exactly `length` bytes.
    fn take(&mut self, length: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(length)?;
        let bytes = self.input.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    // Parses a signed decimal integer. Characters after the digits are left
    // in place. Nothing is consumed when there are no digits.
    //
    // Outer `None`: not a length. Inner `None`: a length too large to fit.
    fn length(&mut self) -> Option<Option<i64>> {
        let start = self.pos;
        let negative = match self.input.get(self.pos) {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        let digits_start = self.pos;
        let mut value: Option<i64> = Some(0);
        while let Some(digit) = self.input.get(self.pos).filter(|byte| byte.is_ascii_digit()) {
            value = value
                .and_then(|value| value.checked_mul(10))
                .and_then(|value| value.checked_add(i64::from(digit - b'0')));
            self.pos += 1;
        }

        if self.pos == digits_start {
            self.pos = start;
            return None;
        }

        Some(value.map(|value| if negative { -value } else { value }))
    }
}

/// Decodes a request read from a TCP session.
///
/// # Errors
///
/// Fails with an [`crate::error::ErrorKind::Protocol`] error when the request
/// is malformed.
pub fn decode(input: &[u8]) -> Result<Request> {
    if starts_with_ignore_case(input, BYE_COMMAND) || starts_with_ignore_case(input, QUIT_COMMAND)
    {
        return Ok(Request::Close);
    }

    if input.len() <= REQUEST_PREFIX.len() || !starts_with_ignore_case(input, REQUEST_PREFIX) {
        return Err(Error::protocol("Request must start by `REQ`."));
    }

    let mut cursor = Cursor::new(input, REQUEST_PREFIX.len());
    cursor.skip_spaces();

    let command = cursor.token();
    if command.is_empty() {
        return Err(Error::protocol("Missing request."));
    }
    let command = String::from_utf8_lossy(command).into_owned();

    let mut arguments = Arguments::new();
    loop {
        cursor.skip_spaces();
        if cursor.at_end() {
            break;
        }

        let argument = match cursor.length() {
            Some(length) => {
                cursor.skip_spaces();
                match length {
                    Some(0) => &[][..],
                    Some(length) if length < 0 => {
                        let token = cursor.token();
                        if token.is_empty() {
                            return Err(Error::protocol("Missing argument after its length."));
                        }
                        token
                    }
                    Some(length) => usize::try_from(length)
                        .ok()
                        .and_then(|length| cursor.take(length))
                        .ok_or_else(|| {
                            Error::protocol("Argument length exceeds the request size.")
                        })?,
                    None => {
                        return Err(Error::protocol("Argument length exceeds the request size."));
                    }
                }
            }
            None => cursor.token(),
        };

        arguments.push(Bytes::copy_from_slice(argument));
    }

    Ok(Request::Frame(Frame::new(command, arguments)))
}

/// Encodes a successful reply.
///
/// # Errors
///
/// Fails with an [`crate::error::ErrorKind::OutOfMemory`] error when the
/// output buffer cannot be allocated.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>> {
    let header = if reply.is_empty() {
        format!("{REPLY_PREFIX} 0\n")
    } else {
        format!("{REPLY_PREFIX} {} ", reply.len())
    };

    let mut buffer = Vec::new();
    if reply.is_empty() {
        buffer.try_reserve_exact(header.len())?;
        buffer.extend_from_slice(header.as_bytes());
        return Ok(buffer);
    }

    buffer.try_reserve_exact(header.len() + reply.len() + 1)?;
    buffer.extend_from_slice(header.as_bytes());
    buffer.extend_from_slice(reply.payload());
    buffer.push(b'\n');

    Ok(buffer)
}

/// Encodes an error.
///
/// # Errors
///
/// Fails with an [`crate::error::ErrorKind::OutOfMemory`] error when the
/// output buffer cannot be allocated.
pub fn encode_error(error: &Error) -> Result<Vec<u8>> {
    let message = error.description();
    let line = format!(
        "{ERROR_PREFIX} {} {} {message}\n",
        error.kind().code(),
        message.len()
    );

    let mut buffer = Vec::new();
    buffer.try_reserve_exact(line.len())?;
    buffer.extend_from_slice(line.as_bytes());

    Ok(buffer)
}

/// Encodes the outcome of a request.
///
/// Exactly one line is produced. When the reply cannot be encoded, an
/// out-of-memory error line is produced instead.
#[must_use]
pub fn encode(outcome: &Result<Reply>) -> Vec<u8> {
    let encoded = match outcome {
        Ok(reply) => encode_reply(reply),
        Err(error) => encode_error(error),
    };

    encoded
        .or_else(|error| encode_error(&error))
        .unwrap_or_else(|_| OUT_OF_MEMORY_LINE.to_vec())
}
