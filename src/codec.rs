//! Binary encoding of a [`Continuum`], used to keep built rings in a cache.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! "KTMA" | version: u8 | built_at: i64
//! server_count: u32 | server_count * (len: u32 | address bytes)
//! point_count: u32  | point_count * (position: u32 | server_index: u32)
//! ```
use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    bytes::complete::tag,
    combinator::{all_consuming, map, map_res, verify},
    multi::{length_count, length_data},
    number::complete::{be_i64, be_u32, u8 as byte},
    sequence::{pair, tuple},
    IResult,
};

use crate::error::Error;
use crate::ring::{Continuum, Entry};

const MAGIC: &[u8] = b"KTMA";
const VERSION: u8 = 1;

impl Continuum {
    /// Encodes the continuum so that [`Continuum::deserialize`] can restore it exactly.
    pub fn serialize(&self) -> Bytes {
        let servers = self.servers();
        let entries = self.entries();

        let addr_bytes: usize = servers.iter().map(|s| 4 + s.len()).sum();
        let mut buf =
            BytesMut::with_capacity(MAGIC.len() + 1 + 8 + 4 + addr_bytes + 4 + entries.len() * 8);

        buf.put_slice(MAGIC);
        buf.put_u8(VERSION);
        buf.put_i64(self.built_at());

        buf.put_u32(servers.len() as u32);
        for server in servers {
            buf.put_u32(server.len() as u32);
            buf.put_slice(server.as_bytes());
        }

        buf.put_u32(entries.len() as u32);
        for entry in entries {
            buf.put_u32(entry.value);
            buf.put_u32(entry.server_index as u32);
        }

        buf.freeze()
    }

    /// Decodes a continuum produced by [`Continuum::serialize`].
    ///
    /// Returns [`Error::CorruptPayload`] if the payload is truncated, has trailing data, was
    /// written by another format version, or describes an invalid continuum.
    pub fn deserialize(buf: &[u8]) -> Result<Continuum, Error> {
        let (_, (built_at, servers, points)) =
            all_consuming(parse_continuum)(buf).map_err(|e| match e {
                nom::Err::Incomplete(_) => Error::CorruptPayload("truncated".to_string()),
                nom::Err::Error(e) | nom::Err::Failure(e) => {
                    Error::CorruptPayload(e.code.description().to_string())
                }
            })?;

        Continuum::from_parts(servers, points, built_at)
    }
}

fn parse_address(buf: &[u8]) -> IResult<&[u8], String> {
    map_res(length_data(be_u32), |s: &[u8]| {
        std::str::from_utf8(s).map(str::to_string)
    })(buf)
}

fn parse_entry(buf: &[u8]) -> IResult<&[u8], Entry> {
    map(pair(be_u32, be_u32), |(value, server_index)| Entry {
        value,
        server_index: server_index as usize,
    })(buf)
}

fn parse_continuum(buf: &[u8]) -> IResult<&[u8], (i64, Vec<String>, Vec<Entry>)> {
    let (buf, (_, _, built_at)) =
        tuple((tag(MAGIC), verify(byte, |v: &u8| *v == VERSION), be_i64))(buf)?;
    let (buf, servers) = length_count(be_u32, parse_address)(buf)?;
    let (buf, points) = length_count(be_u32, parse_entry)(buf)?;

    Ok((buf, (built_at, servers, points)))
}
