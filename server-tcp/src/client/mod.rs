use crate::protocol::{self, Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use shared::{Error, Result};
use std::time::Duration;
use tally::KeyValueStore;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info};

/// [`KeyValueStore`] backed by a remote store over the binary TCP protocol.
///
/// Requests on one client are serialized; open more clients for parallelism.
///
/// A request whose future is dropped between sending and reading the reply
/// leaves the connection out of step, so the client gives the connection up
/// and every later request fails with [`Error::Connection`]. Reconnect to
/// recover.
pub struct StoreClient {
    // `None` once a request was interrupted or hit an I/O error
    framed: Mutex<Option<Framed<TcpStream, LengthDelimitedCodec>>>,
}

impl StoreClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_max_frame(addr, protocol::MAX_FRAME_BYTES).await
    }

    pub async fn connect_with_max_frame(
        addr: impl ToSocketAddrs,
        max_frame_bytes: usize,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        if let Ok(peer) = stream.peer_addr() {
            info!("Connected to store at {}", peer);
        }

        Ok(Self {
            framed: Mutex::new(Some(Framed::new(stream, protocol::codec(max_frame_bytes)))),
        })
    }

    /// Flush and shut down the connection
    pub async fn close(self) -> Result<()> {
        if let Some(mut framed) = self.framed.into_inner() {
            SinkExt::<Bytes>::close(&mut framed).await?;
            debug!("Store connection closed");
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        match self.request(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("PING", other)),
        }
    }

    async fn request(&self, request: Request) -> Result<Response> {
        let mut slot = self.framed.lock().await;

        // Taken for the whole round trip; only a completed one puts it back
        let mut framed = slot.take().ok_or_else(|| {
            Error::Connection("connection unusable after an interrupted request, reconnect".to_string())
        })?;

        framed.send(request.encode()).await?;

        let frame = framed
            .next()
            .await
            .ok_or_else(|| Error::Connection("store closed the connection".to_string()))??;
        *slot = Some(framed);

        match Response::decode(frame.freeze()).map_err(Error::Protocol)? {
            Response::Error { msg } => Err(Error::Remote(msg)),
            response => Ok(response),
        }
    }

    async fn integer(&self, cmd: &str, request: Request) -> Result<i64> {
        match self.request(request).await? {
            Response::Integer { value } => Ok(value),
            other => Err(unexpected(cmd, other)),
        }
    }

    async fn ok(&self, cmd: &str, request: Request) -> Result<()> {
        match self.request(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(cmd, other)),
        }
    }
}

fn unexpected(cmd: &str, response: Response) -> Error {
    Error::Protocol(format!("unexpected response to {cmd}: {response:?}"))
}

#[async_trait]
impl KeyValueStore for StoreClient {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let request = Request::Get {
            key: key.to_string(),
        };
        match self.request(request).await? {
            Response::Value { value } => Ok(Some(value)),
            Response::NotFound => Ok(None),
            other => Err(unexpected("GET", other)),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let request = Request::Set {
            key: key.to_string(),
            value,
        };
        self.ok("SET", request).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let request = Request::Incr {
            key: key.to_string(),
        };
        self.integer("INCR", request).await
    }

    async fn rpush(&self, key: &str, value: Bytes) -> Result<u64> {
        let request = Request::RPush {
            key: key.to_string(),
            value,
        };
        let len = self.integer("RPUSH", request).await?;
        u64::try_from(len).map_err(|_| Error::Protocol(format!("negative list length {len}")))
    }

    async fn rpush_many(&self, entries: Vec<(String, Bytes)>) -> Result<()> {
        self.ok("RPUSH_MANY", Request::RPushMany { entries }).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        let request = Request::LRange {
            key: key.to_string(),
            start,
            stop,
        };
        match self.request(request).await? {
            Response::List { values } => Ok(values),
            other => Err(unexpected("LRANGE", other)),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let request = Request::Expire {
            key: key.to_string(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        Ok(self.integer("EXPIRE", request).await? == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let request = Request::Exists {
            key: key.to_string(),
        };
        Ok(self.integer("EXISTS", request).await? == 1)
    }

    async fn flush_db(&self) -> Result<()> {
        self.ok("FLUSHDB", Request::FlushDb).await
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient").finish_non_exhaustive()
    }
}
