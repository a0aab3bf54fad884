use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use server_tcp::protocol::{self, MAX_FRAME_BYTES};
use server_tcp::{Response, StoreClient};
use shared::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tally::{Cache, ContentCache, Fetcher, KeyValueStore, MemoryStore, OperationIdentity};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    tokio::spawn(async move {
        let _ = server_tcp::serve(listener, store, MAX_FRAME_BYTES).await;
    });

    addr
}

async fn connect(addr: SocketAddr) -> Arc<dyn KeyValueStore> {
    let client = StoreClient::connect(addr).await.unwrap();
    client.ping().await.unwrap();
    Arc::new(client)
}

#[tokio::test]
async fn test_store_commands_over_tcp() {
    let addr = start_server().await;
    let store = connect(addr).await;

    assert_eq!(store.get("missing").await.unwrap(), None);

    store.set("greeting", Bytes::from("hello")).await.unwrap();
    assert_eq!(store.get("greeting").await.unwrap(), Some(Bytes::from("hello")));

    assert_eq!(store.incr("visits").await.unwrap(), 1);
    assert_eq!(store.incr("visits").await.unwrap(), 2);

    assert_eq!(store.rpush("letters", Bytes::from("a")).await.unwrap(), 1);
    assert_eq!(store.rpush("letters", Bytes::from("b")).await.unwrap(), 2);
    assert_eq!(
        store.lrange("letters", 0, -1).await.unwrap(),
        vec![Bytes::from("a"), Bytes::from("b")]
    );

    assert!(store.expire("greeting", Duration::from_secs(60)).await.unwrap());
    assert!(!store.expire("nothing", Duration::from_secs(60)).await.unwrap());
    assert!(store.exists("greeting").await.unwrap());

    store.flush_db().await.unwrap();
    assert!(!store.exists("greeting").await.unwrap());
}

#[tokio::test]
async fn test_remote_errors_surface_as_remote() {
    let addr = start_server().await;
    let store = connect(addr).await;

    store.set("name", Bytes::from("plain text")).await.unwrap();

    let result = store.incr("name").await;
    assert!(
        matches!(&result, Err(Error::Remote(msg)) if msg.contains("not an integer")),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_cache_and_replay_over_tcp() {
    let addr = start_server().await;
    let store = connect(addr).await;

    let cache = Cache::open(store.clone()).await.unwrap();
    let first = cache.store("foo").await.unwrap();
    let second = cache.store(42i64).await.unwrap();

    assert_eq!(cache.get_str(&first).await.unwrap(), Some("foo".to_string()));
    assert_eq!(cache.get_int(&second).await.unwrap(), 42);

    // A second connection sees the same history
    let other = connect(addr).await;
    let report = tally::ReplayReporter::new(other)
        .report(&OperationIdentity::new("Cache.store"))
        .await
        .unwrap();

    assert_eq!(
        report.to_string(),
        format!(
            "Cache.store was called 2 times:\n\
             Cache.store(*(\"foo\",)) -> {first}\n\
             Cache.store(*(42,)) -> {second}"
        )
    );
}

struct StaticFetcher;

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> shared::Result<String> {
        Ok(format!("<html>{url}</html>"))
    }
}

#[tokio::test]
async fn test_content_cache_over_tcp() {
    let addr = start_server().await;
    let store = connect(addr).await;
    let pages = ContentCache::new(StaticFetcher, store.clone());

    let first = pages.get_page("http://slowwly.example").await.unwrap();
    let second = pages.get_page("http://slowwly.example").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(pages.access_count("http://slowwly.example").await.unwrap(), 1);
    assert!(store.exists("cached:http://slowwly.example").await.unwrap());
}

#[tokio::test]
async fn test_garbage_frame_gets_error_and_connection_survives() {
    let addr = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(stream, protocol::codec(MAX_FRAME_BYTES));

    framed.send(Bytes::from_static(&[0x7F])).await.unwrap();
    let reply = Response::decode(framed.next().await.unwrap().unwrap().freeze()).unwrap();
    assert!(matches!(reply, Response::Error { .. }));

    framed.send(server_tcp::Request::Ping.encode()).await.unwrap();
    let reply = Response::decode(framed.next().await.unwrap().unwrap().freeze()).unwrap();
    assert_eq!(reply, Response::Pong);
}

#[tokio::test]
async fn test_close_client() {
    let addr = start_server().await;
    let client = StoreClient::connect(addr).await.unwrap();
    client.ping().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_interrupted_request_gives_up_the_connection() {
    // Reads requests and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(socket, protocol::codec(MAX_FRAME_BYTES));
        while let Some(Ok(_)) = framed.next().await {}
    });

    let client = StoreClient::connect(addr).await.unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(100), client.ping()).await;
    assert!(timed_out.is_err());

    // A later reply to the dropped ping must never be read as this answer
    let result = client.get("greeting").await;
    assert!(matches!(result, Err(Error::Connection(_))), "{result:?}");
}
