//! A ketama-compatible consistent hash ring.
//!
//! The continuum is a sorted list of points on the space 0x00000000 - 0xFFFFFFFF, each owned by
//! a server. Every server receives a number of points proportional to its share of the total
//! weight, so that adding or removing a server only remaps the keys that fall between its points.
//! For a given key, we take the first four bytes of its MD5 digest and pick the first point whose
//! position is greater than or equal to that value, wrapping around to the first point.
//!
//! The point layout is the one used by libketama and its ports: for every server, `k` runs over
//! `floor(share * 40 * server_count)` point groups, and each MD5 digest of `"<address>-<k>"`
//! yields four little-endian `u32` positions.

use md5::{Digest, Md5};

use crate::error::Error;
use crate::server::ServerInfo;

const POINT_GROUPS_PER_SERVER: f64 = 40.0;
const POINTS_PER_HASH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) value: u32,
    pub(crate) server_index: usize,
}

/// A single point on the continuum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingPoint<'a> {
    /// Position on the 32-bit circular key space.
    pub position: u32,
    /// Address of the server owning this point.
    pub address: &'a str,
}

/// An immutable consistent hash ring over a set of weighted servers.
///
/// A [`Continuum`] is never empty: [`Continuum::build`] refuses to build one without servers, and
/// decoding rejects payloads without points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Continuum {
    servers: Vec<String>,
    points: Vec<Entry>,
    built_at: i64,
}

impl Continuum {
    /// Builds the continuum for the given servers.
    ///
    /// `built_at` is the modification time of the source the servers came from. It is only
    /// carried along so that cached copies can be checked for freshness.
    ///
    /// Points landing on the same position keep their emission order: server index, then point
    /// group, then digest chunk.
    pub fn build(servers: &[ServerInfo], built_at: i64) -> Result<Continuum, Error> {
        if servers.is_empty() {
            return Err(Error::EmptyServerList);
        }

        let total_weight: u64 = servers.iter().map(|s| u64::from(s.weight())).sum();
        if total_weight == 0 {
            return Err(Error::ZeroTotalWeight);
        }

        let server_count = servers.len() as f64;
        let mut points = Vec::new();

        for (i, server) in servers.iter().enumerate() {
            let share = f64::from(server.weight()) / total_weight as f64;
            let point_groups = (share * POINT_GROUPS_PER_SERVER * server_count).floor() as usize;
            points.reserve(point_groups * POINTS_PER_HASH);

            for k in 0..point_groups {
                let digest = Md5::new()
                    .chain_update(server.address())
                    .chain_update(b"-")
                    .chain_update(k.to_string())
                    .finalize();

                for chunk in digest.chunks_exact(4) {
                    points.push(Entry {
                        value: u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                        server_index: i,
                    });
                }
            }
        }

        // Stable, so ties keep emission order.
        points.sort_by_key(|entry| entry.value);

        Ok(Continuum {
            servers: servers.iter().map(|s| s.address().to_string()).collect(),
            points,
            built_at,
        })
    }

    pub(crate) fn from_parts(
        servers: Vec<String>,
        points: Vec<Entry>,
        built_at: i64,
    ) -> Result<Continuum, Error> {
        if points.is_empty() {
            return Err(Error::CorruptPayload("continuum has no points".to_string()));
        }
        if servers.iter().any(|s| s.is_empty()) {
            return Err(Error::CorruptPayload("empty server address".to_string()));
        }
        if let Some(entry) = points.iter().find(|e| e.server_index >= servers.len()) {
            return Err(Error::CorruptPayload(format!(
                "point references unknown server {}",
                entry.server_index
            )));
        }
        if points.windows(2).any(|w| w[0].value > w[1].value) {
            return Err(Error::CorruptPayload("points are not sorted".to_string()));
        }

        Ok(Continuum {
            servers,
            points,
            built_at,
        })
    }

    /// Returns the index, in the original server list, of the server owning `key`.
    pub fn server_index_for<K: AsRef<[u8]>>(&self, key: K) -> usize {
        if self.servers.len() == 1 {
            return 0;
        }

        let hash = hash_for(key);
        let index = self.points.partition_point(|e| e.value < hash);
        if index == self.points.len() {
            self.points[0].server_index
        } else {
            self.points[index].server_index
        }
    }

    /// Returns the address of the server owning `key`.
    pub fn server_for<K: AsRef<[u8]>>(&self, key: K) -> &str {
        &self.servers[self.server_index_for(key)]
    }

    /// Iterates over the points of the continuum, in ascending position order.
    pub fn points(&self) -> impl Iterator<Item = RingPoint<'_>> + '_ {
        self.points.iter().map(move |e| RingPoint {
            position: e.value,
            address: &self.servers[e.server_index],
        })
    }

    /// The number of points on the continuum.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the continuum has no points. A built continuum always has points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The server addresses, in the order the continuum was built with.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// The modification time of the source this continuum was built from.
    pub fn built_at(&self) -> i64 {
        self.built_at
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.points
    }
}

/// Hashes a key onto the continuum: the first four bytes of its MD5 digest, little-endian.
pub fn hash_for<K: AsRef<[u8]>>(key: K) -> u32 {
    let digest = Md5::digest(key.as_ref());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}
