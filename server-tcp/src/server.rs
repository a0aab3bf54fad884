use crate::protocol::{self, Request, Response};
use futures::{SinkExt, StreamExt};
use shared::Error;
use std::sync::Arc;
use std::time::Duration;
use tally::KeyValueStore;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Accept connections forever, one task per connection
pub async fn serve(
    listener: TcpListener,
    store: Arc<dyn KeyValueStore>,
    max_frame_bytes: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (socket, addr) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            info!("Connection {addr} successful.");

            if let Err(err) = process_connection(socket, store, max_frame_bytes).await {
                warn!("Connection {addr} error: {err:?}");
            }
        });
    }
}

pub async fn process_connection(
    socket: TcpStream,
    store: Arc<dyn KeyValueStore>,
    max_frame_bytes: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    socket.set_nodelay(true).ok();

    // Wrap the socket with the codec - now we get BytesMut frames instead of raw bytes
    let mut framed = Framed::new(socket, protocol::codec(max_frame_bytes));

    while let Some(frame_result) = framed.next().await {
        let frame = frame_result?;

        let request = match Request::decode(frame.freeze()) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to decode request: {}", e);
                let error_resp = Response::Error { msg: e };
                framed.send(error_resp.encode()).await?;
                continue;
            }
        };

        debug!("Received request: {:?}", request);

        let response = handle(store.as_ref(), request).await;
        framed.send(response.encode()).await?;
    }

    Ok(())
}

/// Run one request against the store
pub async fn handle(store: &dyn KeyValueStore, request: Request) -> Response {
    let result = match request {
        Request::Ping => return Response::Pong,

        Request::Get { key } => store.get(&key).await.map(|value| match value {
            Some(value) => Response::Value { value },
            None => Response::NotFound,
        }),

        Request::Set { key, value } => store.set(&key, value).await.map(|_| Response::Ok),

        Request::Incr { key } => store
            .incr(&key)
            .await
            .map(|value| Response::Integer { value }),

        Request::RPush { key, value } => store.rpush(&key, value).await.map(|len| {
            Response::Integer {
                value: i64::try_from(len).unwrap_or(i64::MAX),
            }
        }),

        Request::RPushMany { entries } => store.rpush_many(entries).await.map(|_| Response::Ok),

        Request::LRange { key, start, stop } => store
            .lrange(&key, start, stop)
            .await
            .map(|values| Response::List { values }),

        Request::Expire { key, ttl_ms } => store
            .expire(&key, Duration::from_millis(ttl_ms))
            .await
            .map(|existed| Response::Integer {
                value: i64::from(existed),
            }),

        Request::Exists { key } => store.exists(&key).await.map(|exists| Response::Integer {
            value: i64::from(exists),
        }),

        Request::FlushDb => store.flush_db().await.map(|_| Response::Ok),
    };

    result.unwrap_or_else(|e: Error| {
        warn!("Request failed: {}", e);
        Response::Error { msg: e.to_string() }
    })
}
