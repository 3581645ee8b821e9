//! Server definitions: where the list of servers for a continuum comes from.
//!
//! The file format is one server per line, `<address><spaces or tabs><weight>`, with anything
//! after the weight ignored. Blank lines and lines starting with `#` are skipped.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use btoi::btou;
use nom::{
    bytes::complete::take_till1,
    character::complete::{digit1, space1},
    combinator::map_res,
    sequence::separated_pair,
    IResult,
};

use crate::error::Error;
use crate::server::ServerInfo;

/// A source of server definitions.
pub trait DefinitionReader {
    /// Reads the list of servers.
    ///
    /// Implementations must not return an empty list; [`Error::EmptyServerList`] is the expected
    /// error in that case.
    fn read_servers(&self) -> impl Future<Output = Result<Vec<ServerInfo>, Error>>;
}

impl DefinitionReader for [ServerInfo] {
    async fn read_servers(&self) -> Result<Vec<ServerInfo>, Error> {
        if self.is_empty() {
            return Err(Error::EmptyServerList);
        }
        Ok(self.to_vec())
    }
}

impl DefinitionReader for Vec<ServerInfo> {
    async fn read_servers(&self) -> Result<Vec<ServerInfo>, Error> {
        self.as_slice().read_servers().await
    }
}

/// Reads server definitions from a file on disk.
#[derive(Clone, Debug)]
pub struct FileDefinitions {
    path: PathBuf,
}

impl FileDefinitions {
    /// Creates a reader for the definitions file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> FileDefinitions {
        FileDefinitions {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The path of the definitions file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the modification time of the file, in seconds since the Unix epoch.
    pub async fn modification_time(&self) -> Result<i64, Error> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| self.access_error(e))?;

        Ok(match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        })
    }

    fn access_error(&self, source: std::io::Error) -> Error {
        Error::FileAccess {
            path: self.path.clone(),
            source,
        }
    }
}

impl DefinitionReader for FileDefinitions {
    async fn read_servers(&self) -> Result<Vec<ServerInfo>, Error> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.access_error(e))?;

        parse_definitions(&contents)
    }
}

fn parse_definition(line: &str) -> IResult<&str, (&str, u32)> {
    separated_pair(
        take_till1(|c: char| c == ' ' || c == '\t'),
        space1,
        map_res(digit1, |d: &str| btou::<u32>(d.as_bytes())),
    )(line)
}

/// Parses the contents of a definitions file into a list of servers.
///
/// Fails with [`Error::DefinitionParse`] on the first malformed line, [`Error::EmptyServerList`]
/// if no line defines a server and [`Error::ZeroTotalWeight`] if every weight is zero.
pub fn parse_definitions(contents: &str) -> Result<Vec<ServerInfo>, Error> {
    let mut records = Vec::new();

    for (i, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = || Error::DefinitionParse {
            line: i + 1,
            content: trimmed.to_string(),
        };

        let (_, (address, weight)) = parse_definition(line).map_err(|_| parse_error())?;
        records.push((i + 1, trimmed, address, weight));
    }

    if records.is_empty() {
        return Err(Error::EmptyServerList);
    }
    if records.iter().all(|(_, _, _, weight)| *weight == 0) {
        return Err(Error::ZeroTotalWeight);
    }

    records
        .into_iter()
        .map(|(line, content, address, weight)| {
            ServerInfo::new(address, weight).map_err(|_| Error::DefinitionParse {
                line,
                content: content.to_string(),
            })
        })
        .collect()
}
