use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::CacheGateway;
use crate::connection::Connection;
use crate::error::Error;
use crate::parser::{parse_response, ErrorKind, Response, Status};

const MAX_KEY_LENGTH: usize = 250;

/// A cache backed by a single memcached server, spoken to over the ASCII protocol.
///
/// Memcached reads TTLs above 30 days as absolute Unix timestamps; pick `ttl` accordingly.
pub struct MemcachedCache {
    buf: BytesMut,
    last_read_n: Option<usize>,
    conn: Connection,
}

impl MemcachedCache {
    /// Connects to the memcached server at `dsn`.
    ///
    /// The DSN should be in the format of `<host>:<port>`, `tcp://<host>:<port>` or
    /// `unix://<path>`.
    pub async fn connect<S: AsRef<str>>(dsn: S) -> Result<MemcachedCache, Error> {
        let conn = Connection::new(dsn).await?;

        Ok(MemcachedCache {
            buf: BytesMut::new(),
            last_read_n: None,
            conn,
        })
    }

    async fn read_response(&mut self) -> Result<Response, Error> {
        // If we serviced a previous request, advance our buffer forward.
        if let Some(n) = self.last_read_n.take() {
            let _ = self.buf.split_to(n);
        }

        let mut needs_more_data = false;
        loop {
            if self.buf.is_empty() || needs_more_data {
                self.buf.reserve(1024);
                let result = match self.conn.read_buf(&mut self.buf).await {
                    Ok(0) => Err(std::io::ErrorKind::UnexpectedEof.into()),
                    result => result,
                };
                if let Err(e) = result {
                    self.buf.clear();
                    return Err(Error::Io(e));
                }
            }

            match parse_response(&self.buf) {
                Ok(Some((n, response))) => {
                    self.last_read_n = Some(n);
                    return Ok(response);
                }
                Ok(None) => {
                    needs_more_data = true;
                    continue;
                }
                Err(kind) => {
                    // Whatever is buffered can't be framed anymore; start the next reply fresh.
                    self.buf.clear();
                    return Err(Status::Error(kind).into());
                }
            }
        }
    }
}

fn check_key(key: &str) -> Result<(), Error> {
    if key.is_empty()
        || key.len() > MAX_KEY_LENGTH
        || key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
    {
        return Err(Status::Error(ErrorKind::Client(format!("invalid key `{}`", key))).into());
    }
    Ok(())
}

impl CacheGateway for MemcachedCache {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        check_key(key)?;

        self.conn
            .write_all(&[b"get ", key.as_bytes(), b"\r\n"].concat())
            .await?;
        self.conn.flush().await?;

        match self.read_response().await? {
            Response::Data(data) => Ok(data),
            Response::Status(s) => Err(s.into()),
        }
    }

    async fn set(&mut self, key: &str, value: &[u8], ttl: u32) -> Result<(), Error> {
        check_key(key)?;

        let header = format!("set {} 0 {} {}\r\n", key, ttl, value.len());
        self.conn
            .write_all(&[header.as_bytes(), value, b"\r\n"].concat())
            .await?;
        self.conn.flush().await?;

        match self.read_response().await? {
            Response::Status(Status::Stored) => Ok(()),
            Response::Status(Status::Error(kind)) => Err(Status::Error(kind).into()),
            Response::Status(s) => Err(Error::CacheWrite(s.to_string())),
            Response::Data(_) => Err(Status::Error(ErrorKind::Protocol(None)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read, Write};
    use std::net::TcpListener;

    // Serves canned responses for `get`/`set` from a background thread, so the client can be
    // exercised without a real memcached server.
    fn spawn_server(set_reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
        let addr = listener.local_addr().unwrap().to_string();

        std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("Failed to accept connection");
            let mut writer = stream.try_clone().expect("Failed to clone stream");
            let mut reader = std::io::BufReader::new(stream);
            let mut stored: Option<Vec<u8>> = None;

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }

                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts[0] {
                    "get" => {
                        let response = match &stored {
                            Some(v) => {
                                let mut r = format!("VALUE {} 0 {}\r\n", parts[1], v.len())
                                    .into_bytes();
                                r.extend_from_slice(v);
                                r.extend_from_slice(b"\r\nEND\r\n");
                                r
                            }
                            None => b"END\r\n".to_vec(),
                        };
                        writer.write_all(&response).expect("Failed to write response");
                    }
                    "set" => {
                        let len: usize = parts[4].parse().unwrap();
                        let mut value = vec![0; len + 2];
                        reader.read_exact(&mut value).expect("Failed to read value");
                        value.truncate(len);
                        if set_reply == "STORED\r\n" {
                            stored = Some(value);
                        }
                        writer
                            .write_all(set_reply.as_bytes())
                            .expect("Failed to write response");
                    }
                    _ => writer.write_all(b"ERROR\r\n").expect("Failed to write response"),
                }
            }
        });

        addr
    }

    // Answers the first command with an unparseable line and every later one with `END`.
    fn spawn_garbled_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
        let addr = listener.local_addr().unwrap().to_string();

        std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("Failed to accept connection");
            let mut writer = stream.try_clone().expect("Failed to clone stream");
            let mut reader = std::io::BufReader::new(stream);
            let mut reply: &[u8] = b"BOGUS\r\n";

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                writer.write_all(reply).expect("Failed to write response");
                reply = b"END\r\n";
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let addr = spawn_server("STORED\r\n");
        let mut cache = MemcachedCache::connect(&addr).await.unwrap();

        assert_eq!(cache.get("continuum.abc").await, Ok(None));
    }

    #[tokio::test]
    async fn test_set_then_get_binary_value() {
        let addr = spawn_server("STORED\r\n");
        let mut cache = MemcachedCache::connect(format!("tcp://{}", addr))
            .await
            .unwrap();
        let value = b"KTMA\x01\r\n\x00\xff".to_vec();

        cache.set("continuum.abc", &value, 60).await.unwrap();

        assert_eq!(cache.get("continuum.abc").await, Ok(Some(value)));
    }

    #[tokio::test]
    async fn test_not_stored_is_a_cache_write_error() {
        let addr = spawn_server("NOT_STORED\r\n");
        let mut cache = MemcachedCache::connect(&addr).await.unwrap();

        let result = cache.set("continuum.abc", b"value", 60).await;

        assert_eq!(result, Err(Error::CacheWrite("not stored".to_string())));
    }

    #[tokio::test]
    async fn test_server_error_on_set() {
        let addr = spawn_server("SERVER_ERROR out of memory\r\n");
        let mut cache = MemcachedCache::connect(&addr).await.unwrap();

        let result = cache.set("continuum.abc", b"value", 60).await;

        assert_eq!(
            result,
            Err(Error::Protocol(Status::Error(ErrorKind::Server(
                "out of memory".to_string()
            ))))
        );
    }

    #[tokio::test]
    async fn test_recovers_after_malformed_reply() {
        let addr = spawn_garbled_server();
        let mut cache = MemcachedCache::connect(&addr).await.unwrap();

        assert!(matches!(
            cache.get("continuum.abc").await,
            Err(Error::Protocol(Status::Error(ErrorKind::Protocol(_))))
        ));
        assert_eq!(cache.get("continuum.abc").await, Ok(None));
        assert_eq!(cache.get("continuum.abc").await, Ok(None));
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let addr = spawn_server("STORED\r\n");
        let mut cache = MemcachedCache::connect(&addr).await.unwrap();

        assert!(matches!(
            cache.get("has space").await,
            Err(Error::Protocol(Status::Error(ErrorKind::Client(_))))
        ));
        assert!(matches!(
            cache.set(&"k".repeat(251), b"v", 0).await,
            Err(Error::Protocol(Status::Error(ErrorKind::Client(_))))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = MemcachedCache::connect(&addr).await;

        assert!(matches!(result, Err(Error::Io(_))));
    }
}
