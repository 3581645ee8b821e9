use crate::parser::Status;
use std::{fmt, io, path::PathBuf};

/// Error type for [`Ketama`](crate::Ketama) and continuum operations.
#[derive(Debug)]
pub enum Error {
    /// The server definitions could not be read from disk.
    FileAccess {
        /// Path of the definitions file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A definitions line did not match `<address> <weight>`, or described an invalid server.
    DefinitionParse {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        content: String,
    },
    /// A [`ServerInfo`](crate::ServerInfo) was given an empty address or a zero weight.
    InvalidServer(String),
    /// A continuum was requested for an empty list of servers.
    EmptyServerList,
    /// The weights of all servers sum to zero.
    ZeroTotalWeight,
    /// A serialized continuum could not be decoded.
    CorruptPayload(String),
    /// The cache refused to store a value.
    CacheWrite(String),
    /// I/O-related error.
    Io(io::Error),
    /// A protocol-level error i.e. a failed operation or message that
    /// does not match the memcached protocol.
    Protocol(Status),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::FileAccess { path: p1, source: e1 },
                Self::FileAccess { path: p2, source: e2 },
            ) => p1 == p2 && e1.kind() == e2.kind(),
            (
                Self::DefinitionParse { line: l1, content: c1 },
                Self::DefinitionParse { line: l2, content: c2 },
            ) => l1 == l2 && c1 == c2,
            (Self::InvalidServer(s1), Self::InvalidServer(s2)) => s1 == s2,
            (Self::EmptyServerList, Self::EmptyServerList) => true,
            (Self::ZeroTotalWeight, Self::ZeroTotalWeight) => true,
            (Self::CorruptPayload(s1), Self::CorruptPayload(s2)) => s1 == s2,
            (Self::CacheWrite(s1), Self::CacheWrite(s2)) => s1 == s2,
            (Self::Io(e1), Self::Io(e2)) => e1.kind() == e2.kind(),
            (Self::Protocol(s1), Self::Protocol(s2)) => s1 == s2,
            _ => false,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileAccess { ref source, .. } => Some(source),
            Self::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FileAccess { path, source } => {
                write!(f, "failed opening {}: {}", path.display(), source)
            }
            Self::DefinitionParse { line, content } => {
                write!(f, "failed parsing line {}: '{}'", line, content)
            }
            Self::InvalidServer(s) => write!(f, "invalid server: {}", s),
            Self::EmptyServerList => write!(f, "no valid server definitions"),
            Self::ZeroTotalWeight => write!(f, "total server weight is zero"),
            Self::CorruptPayload(s) => write!(f, "corrupt continuum payload: {}", s),
            Self::CacheWrite(s) => write!(f, "cache write: {}", s),
            Self::Io(e) => write!(f, "io: {}", e),
            Self::Protocol(e) => write!(f, "protocol: {}", e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Status> for Error {
    fn from(s: Status) -> Self {
        Error::Protocol(s)
    }
}
