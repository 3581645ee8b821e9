use pin_project::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, BufWriter};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::Error;

#[pin_project(project = ConnectionProjection)]
pub enum Connection {
    Tcp(#[pin] BufWriter<TcpStream>),
    #[cfg(unix)]
    Unix(#[pin] BufWriter<UnixStream>),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProjection::Tcp(s) => s.poll_read(cx, buf),
            #[cfg(unix)]
            ConnectionProjection::Unix(s) => s.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.project() {
            ConnectionProjection::Tcp(s) => s.poll_write(cx, buf),
            #[cfg(unix)]
            ConnectionProjection::Unix(s) => s.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProjection::Tcp(s) => s.poll_flush(cx),
            #[cfg(unix)]
            ConnectionProjection::Unix(s) => s.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProjection::Tcp(s) => s.poll_shutdown(cx),
            #[cfg(unix)]
            ConnectionProjection::Unix(s) => s.poll_shutdown(cx),
        }
    }
}

impl Connection {
    /// Connects to `unix://<path>`, `tcp://<host>:<port>` or `<host>:<port>`.
    pub async fn new<S: AsRef<str>>(dsn: S) -> Result<Connection, Error> {
        let dsn = dsn.as_ref();
        if let Some(path) = dsn.strip_prefix("unix://") {
            return connect_unix(path).await;
        }

        let addr = dsn.strip_prefix("tcp://").unwrap_or(dsn);
        TcpStream::connect(addr)
            .await
            .map(|c| Connection::Tcp(BufWriter::new(c)))
            .map_err(Error::Io)
    }
}

#[cfg(unix)]
async fn connect_unix(path: &str) -> Result<Connection, Error> {
    UnixStream::connect(path)
        .await
        .map(|c| Connection::Unix(BufWriter::new(c)))
        .map_err(Error::Io)
}

#[cfg(not(unix))]
async fn connect_unix(_path: &str) -> Result<Connection, Error> {
    Err(Error::Io(std::io::ErrorKind::Unsupported.into()))
}
