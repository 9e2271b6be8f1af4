//! Scripted TCP mock server for protocol-exact client tests.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One request/response exchange the server expects on a connection.
pub struct Exchange {
    expect: Vec<u8>,
    reply: Vec<u8>,
}

/// Build an exchange asserting the exact request frame `expect` and
/// answering with `reply`. An empty `reply` keeps the connection open
/// without answering (for timeout scenarios).
pub fn exchange(expect: &[u8], reply: &[u8]) -> Exchange {
    Exchange {
        expect: expect.to_vec(),
        reply: reply.to_vec(),
    }
}

/// Serve `scripts.len()` connections in order, each running its scripted
/// exchanges. An empty script closes the connection as soon as it is
/// accepted, simulating a server dying under the client.
pub async fn mock_server(scripts: Vec<Vec<Exchange>>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        for script in scripts {
            let (mut stream, _) = listener.accept().await.unwrap();
            for Exchange { expect, reply } in script {
                let mut request = vec![0u8; expect.len()];
                stream.read_exact(&mut request).await.unwrap();
                assert_eq!(
                    String::from_utf8_lossy(&request),
                    String::from_utf8_lossy(&expect),
                    "unexpected request frame"
                );
                if reply.is_empty() {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                } else {
                    stream.write_all(&reply).await.unwrap();
                }
            }
        }
    });
    (address, handle)
}
