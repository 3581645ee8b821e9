use crate::error::Error;

/// A backend server and its relative capacity.
///
/// The weight decides how many points the server receives on the continuum, in proportion to the
/// total weight of all servers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    address: String,
    weight: u32,
}

impl ServerInfo {
    /// Creates a new [`ServerInfo`].
    ///
    /// Returns [`Error::InvalidServer`] if `address` is empty or `weight` is zero.
    pub fn new<S: Into<String>>(address: S, weight: u32) -> Result<ServerInfo, Error> {
        let address = address.into();
        if address.is_empty() {
            return Err(Error::InvalidServer("empty address".to_string()));
        }
        if weight == 0 {
            return Err(Error::InvalidServer(format!("zero weight for {}", address)));
        }

        Ok(ServerInfo { address, weight })
    }

    /// The address of the server, typically `<host>:<port>`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The relative weight of the server.
    pub fn weight(&self) -> u32 {
        self.weight
    }
}
