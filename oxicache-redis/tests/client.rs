//! Client tests against a scripted mock server asserting exact RESP2 frames.

mod common;

use common::{exchange, mock_server};
use oxicache_redis::{Client, Config, Error, SetOptions};

fn client(address: &str) -> Client {
    Client::new(Config::new(address)).unwrap()
}

#[tokio::test]
async fn set_get_del_round_trip() {
    let (address, _server) = mock_server(vec![vec![
        exchange(
            b"*3\r\n$3\r\nSET\r\n$5\r\nhello\r\n$5\r\nworld\r\n",
            b"+OK\r\n",
        ),
        exchange(b"*2\r\n$3\r\nGET\r\n$5\r\nhello\r\n", b"$5\r\nworld\r\n"),
        exchange(b"*2\r\n$3\r\nDEL\r\n$5\r\nhello\r\n", b":1\r\n"),
        exchange(b"*2\r\n$3\r\nGET\r\n$5\r\nhello\r\n", b"$-1\r\n"),
    ]])
    .await;
    let client = client(&address);

    client
        .set("hello", b"world", &SetOptions::default())
        .await
        .unwrap();

    let mut buf = [0u8; 32];
    let value = client.get("hello", &mut buf).await.unwrap();
    assert_eq!(value, Some(&b"world"[..]));

    assert_eq!(client.del(&["hello"]).await.unwrap(), 1);
    assert_eq!(client.get("hello", &mut buf).await.unwrap(), None);

    // every command reused the single pooled connection
    assert_eq!(client.idle_connections(), 1);
}

#[tokio::test]
async fn set_with_expiry_then_ttl() {
    let (address, _server) = mock_server(vec![vec![
        exchange(
            b"*5\r\n$3\r\nSET\r\n$1\r\nt\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n60\r\n",
            b"+OK\r\n",
        ),
        exchange(b"*2\r\n$3\r\nTTL\r\n$1\r\nt\r\n", b":58\r\n"),
    ]])
    .await;
    let client = client(&address);

    client.set_ex("t", b"v", 60).await.unwrap();
    let ttl = client.ttl("t").await.unwrap();
    assert!(ttl > 0 && ttl <= 60);
}

#[tokio::test]
async fn failed_nx_condition_reads_as_success() {
    let (address, _server) = mock_server(vec![vec![
        exchange(
            b"*4\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nfirst\r\n$2\r\nNX\r\n",
            b"+OK\r\n",
        ),
        exchange(
            b"*4\r\n$3\r\nSET\r\n$1\r\nk\r\n$6\r\nsecond\r\n$2\r\nNX\r\n",
            b"$-1\r\n",
        ),
        exchange(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$5\r\nfirst\r\n"),
    ]])
    .await;
    let client = client(&address);

    client.set_nx("k", b"first").await.unwrap();
    // the nil reply for the failed condition is swallowed
    client.set_nx("k", b"second").await.unwrap();

    let mut buf = [0u8; 32];
    assert_eq!(client.get("k", &mut buf).await.unwrap(), Some(&b"first"[..]));
}

#[tokio::test]
async fn set_get_drains_the_previous_value() {
    let (address, _server) = mock_server(vec![vec![
        exchange(
            b"*4\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\nv2\r\n$3\r\nGET\r\n",
            b"$2\r\nv1\r\n",
        ),
        exchange(b"*1\r\n$6\r\nDBSIZE\r\n", b":1\r\n"),
    ]])
    .await;
    let client = client(&address);

    let options = SetOptions {
        get: true,
        ..SetOptions::default()
    };
    client.set("k", b"v2", &options).await.unwrap();
    // the stream is still aligned after draining the old value
    assert_eq!(client.dbsize().await.unwrap(), 1);
}

#[tokio::test]
async fn counter_commands() {
    let (address, _server) = mock_server(vec![vec![
        exchange(b"*3\r\n$6\r\nINCRBY\r\n$1\r\nc\r\n$1\r\n5\r\n", b":15\r\n"),
        exchange(b"*2\r\n$4\r\nDECR\r\n$1\r\nc\r\n", b":14\r\n"),
        exchange(b"*3\r\n$6\r\nDECRBY\r\n$1\r\nc\r\n$1\r\n4\r\n", b":10\r\n"),
        exchange(b"*3\r\n$6\r\nEXISTS\r\n$1\r\na\r\n$1\r\nb\r\n", b":2\r\n"),
        exchange(b"*3\r\n$6\r\nEXPIRE\r\n$1\r\na\r\n$2\r\n30\r\n", b":1\r\n"),
    ]])
    .await;
    let client = client(&address);

    assert_eq!(client.incr_by("c", 5).await.unwrap(), 15);
    assert_eq!(client.decr("c").await.unwrap(), 14);
    assert_eq!(client.decr_by("c", 4).await.unwrap(), 10);
    assert_eq!(client.exists(&["a", "b"]).await.unwrap(), 2);
    assert!(client.expire("a", 30).await.unwrap());
}

#[tokio::test]
async fn ping_with_and_without_message() {
    let (address, _server) = mock_server(vec![vec![
        exchange(b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n"),
        exchange(b"*2\r\n$4\r\nPING\r\n$5\r\nhello\r\n", b"$5\r\nhello\r\n"),
        exchange(b"*1\r\n$7\r\nFLUSHDB\r\n", b"+OK\r\n"),
    ]])
    .await;
    let client = client(&address);

    client.ping(None).await.unwrap();
    // the echoed message is drained and discarded
    client.ping(Some("hello")).await.unwrap();
    client.flushdb().await.unwrap();
}

#[tokio::test]
async fn server_rejection_keeps_the_connection_pooled() {
    let (address, _server) = mock_server(vec![vec![
        exchange(
            b"*2\r\n$4\r\nINCR\r\n$1\r\nk\r\n",
            b"-ERR value is not an integer or out of range\r\n",
        ),
        exchange(b"*1\r\n$6\r\nDBSIZE\r\n", b":3\r\n"),
    ]])
    .await;
    let client = client(&address);

    match client.incr("k").await {
        Err(Error::Redis(message)) => assert!(message.contains("not an integer")),
        other => panic!("expected a redis error, got {other:?}"),
    }
    assert_eq!(client.idle_connections(), 1);

    // the recycled connection serves the next command
    assert_eq!(client.dbsize().await.unwrap(), 3);
}

#[tokio::test]
async fn wrong_reply_type_destroys_the_connection() {
    let (address, _server) = mock_server(vec![vec![exchange(
        b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
        b":5\r\n",
    )]])
    .await;
    let client = Client::new(Config::new(&address).with_retry_attempts(0)).unwrap();

    let mut buf = [0u8; 32];
    assert!(matches!(
        client.get("k", &mut buf).await,
        Err(Error::UnexpectedType)
    ));
    assert_eq!(client.idle_connections(), 0);
}

#[tokio::test]
async fn oversized_value_destroys_the_connection() {
    let (address, _server) = mock_server(vec![vec![exchange(
        b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
        b"$10\r\nabcdefghij\r\n",
    )]])
    .await;
    let client = Client::new(Config::new(&address).with_retry_attempts(0)).unwrap();

    let mut buf = [0u8; 4];
    assert!(matches!(
        client.get("k", &mut buf).await,
        Err(Error::ValueTooLarge)
    ));
    assert_eq!(client.idle_connections(), 0);
}

#[tokio::test]
async fn retry_survives_a_server_restart() {
    let (address, _server) = mock_server(vec![
        // the first connection dies before answering anything
        vec![],
        vec![
            exchange(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nafter\r\n", b"+OK\r\n"),
            exchange(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$5\r\nafter\r\n"),
        ],
    ])
    .await;
    let client = client(&address);

    client.set("k", b"after", &SetOptions::default()).await.unwrap();

    let mut buf = [0u8; 32];
    assert_eq!(client.get("k", &mut buf).await.unwrap(), Some(&b"after"[..]));
    // the dead connection never re-entered the pool
    assert_eq!(client.idle_connections(), 1);
}

#[tokio::test]
async fn key_batches_are_bounded() {
    let client = client("localhost:6379");
    let keys = vec!["k"; 65];
    // rejected before any I/O
    assert!(matches!(
        client.del(&keys).await,
        Err(Error::TooManyKeys)
    ));
    assert!(matches!(
        client.exists(&keys).await,
        Err(Error::TooManyKeys)
    ));
}
