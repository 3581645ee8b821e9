use std::fmt;

use btoi::btou;
use nom::{
    branch::alt,
    bytes::streaming::{tag, take, take_until, take_while1, take_while_m_n},
    character::{is_digit, streaming::crlf},
    combinator::{map, map_res, opt, value},
    sequence::{preceded, terminated, tuple},
    IResult,
};

/// Outcome of a memcached command that did not return data.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    /// The value was stored.
    Stored,
    /// The value was not stored, e.g. the server is out of memory.
    NotStored,
    /// The item was modified since it was last fetched.
    Exists,
    /// The item does not exist.
    NotFound,
    /// The server reported an error.
    Error(ErrorKind),
}

/// Kind of error reported by, or while talking to, a memcached server.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    /// `ERROR`: the server did not understand the command.
    Generic,
    /// The response did not match the protocol.
    Protocol(Option<String>),
    /// `CLIENT_ERROR <message>`.
    Client(String),
    /// `SERVER_ERROR <message>`.
    Server(String),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Response {
    Status(Status),
    Data(Option<Vec<u8>>),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Stored => write!(f, "stored"),
            Self::NotStored => write!(f, "not stored"),
            Self::Exists => write!(f, "exists"),
            Self::NotFound => write!(f, "not found"),
            Self::Error(ek) => write!(f, "error: {}", ek),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::Protocol(Some(s)) => write!(f, "protocol: {}", s),
            Self::Protocol(None) => write!(f, "protocol"),
            Self::Client(s) => write!(f, "client: {}", s),
            Self::Server(s) => write!(f, "server: {}", s),
        }
    }
}

fn parse_ascii_status(buf: &[u8]) -> IResult<&[u8], Response> {
    terminated(
        alt((
            value(Response::Status(Status::Stored), tag(b"STORED")),
            value(Response::Status(Status::NotStored), tag(b"NOT_STORED")),
            value(Response::Status(Status::Exists), tag(b"EXISTS")),
            value(Response::Status(Status::NotFound), tag(b"NOT_FOUND")),
        )),
        crlf,
    )(buf)
}

fn parse_ascii_error(buf: &[u8]) -> IResult<&[u8], Response> {
    let parser = terminated(
        alt((
            value(ErrorKind::Generic, tag(b"ERROR")),
            map_res(preceded(tag(b"CLIENT_ERROR "), take_until("\r\n")), |s| {
                std::str::from_utf8(s).map(|s| ErrorKind::Client(s.to_string()))
            }),
            map_res(preceded(tag(b"SERVER_ERROR "), take_until("\r\n")), |s| {
                std::str::from_utf8(s).map(|s| ErrorKind::Server(s.to_string()))
            }),
        )),
        crlf,
    );

    map(parser, |e| Response::Status(Status::Error(e)))(buf)
}

fn parse_ascii_u32(buf: &[u8]) -> IResult<&[u8], u32> {
    map_res(take_while_m_n(1, 10, is_digit), btou)(buf)
}

fn parse_ascii_u64(buf: &[u8]) -> IResult<&[u8], u64> {
    map_res(take_while_m_n(1, 20, is_digit), btou)(buf)
}

fn is_key_char(chr: u8) -> bool {
    chr > 32 && chr < 127
}

fn parse_ascii_value(buf: &[u8]) -> IResult<&[u8], Vec<u8>> {
    // VALUE key flags data_len [cas id]\r\n
    // data block\r\n
    let (buf, (_, _, _, _, _, len, _, _, _)) = tuple((
        tag("VALUE "),
        take_while1(is_key_char),
        tag(" "),
        parse_ascii_u32,
        tag(" "),
        parse_ascii_u64,
        opt(tag(" ")),
        opt(parse_ascii_u64),
        crlf,
    ))(buf)?;
    let (buf, data) = terminated(take(len), crlf)(buf)?;

    Ok((buf, data.to_vec()))
}

fn parse_ascii_data(buf: &[u8]) -> IResult<&[u8], Response> {
    map(
        terminated(opt(parse_ascii_value), tag("END\r\n")),
        Response::Data,
    )(buf)
}

fn parse_ascii_response(buf: &[u8]) -> IResult<&[u8], Response> {
    alt((parse_ascii_status, parse_ascii_error, parse_ascii_data))(buf)
}

/// Parses a single response, returning the number of bytes consumed along with it, or `None` if
/// more data is needed.
pub(crate) fn parse_response(buf: &[u8]) -> Result<Option<(usize, Response)>, ErrorKind> {
    match parse_ascii_response(buf) {
        Ok((remaining, response)) => Ok(Some((buf.len() - remaining.len(), response))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ErrorKind::Protocol(Some(e.code.description().to_string())))
        }
    }
}
