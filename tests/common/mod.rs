// Fake clamd for integration tests
//
// Speaks just enough of the z-command protocol: reads one NUL-terminated
// command, drains INSTREAM chunks up to the zero-length terminator, writes
// the canned reply and closes the connection.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clamrest::clamd::{DaemonAddress, Timeouts};
use clamrest::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One command as received by the fake daemon
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command as sent, e.g. `zINSTREAM` or `zALLMATCHSCAN /tmp`
    pub command: String,
    /// Reassembled INSTREAM payload
    pub payload: Vec<u8>,
    /// Number of non-terminator INSTREAM chunks
    pub chunks: usize,
}

pub struct FakeClamd {
    pub address: DaemonAddress,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeClamd {
    /// Serve connections forever, answering each with `reply(&request)`
    pub async fn spawn<F>(reply: F) -> Self
    where
        F: Fn(&Request) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let reply = Arc::new(reply);

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = seen.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    handle(socket, &*reply, &seen).await;
                });
            }
        });

        Self {
            address: DaemonAddress::tcp("127.0.0.1", port),
            requests,
        }
    }

    /// Answer every command with the same bytes
    pub async fn replying(reply: &'static [u8]) -> Self {
        Self::spawn(move |_| reply.to_vec()).await
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle<F>(mut socket: TcpStream, reply: &F, seen: &Mutex<Vec<Request>>) -> Option<()>
where
    F: Fn(&Request) -> Vec<u8>,
{
    let mut command = Vec::new();
    loop {
        let byte = socket.read_u8().await.ok()?;
        if byte == 0 {
            break;
        }
        command.push(byte);
    }

    let mut request = Request {
        command: String::from_utf8_lossy(&command).into_owned(),
        payload: Vec::new(),
        chunks: 0,
    };

    if request.command == "zINSTREAM" {
        loop {
            let len = socket.read_u32().await.ok()? as usize;
            if len == 0 {
                break;
            }
            let mut chunk = vec![0u8; len];
            socket.read_exact(&mut chunk).await.ok()?;
            request.payload.extend_from_slice(&chunk);
            request.chunks += 1;
        }
    }

    let response = reply(&request);
    // Recorded before replying so callers see it once they have the answer
    seen.lock().unwrap().push(request);
    socket.write_all(&response).await.ok()?;
    socket.shutdown().await.ok()
}

/// An address with nothing listening on it
pub async fn dead_address() -> DaemonAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    DaemonAddress::tcp("127.0.0.1", port)
}

/// Config pointed at `address` with short deadlines
pub fn test_config(address: DaemonAddress) -> Config {
    Config {
        clamd_address: address,
        timeouts: Timeouts {
            connect: Duration::from_secs(2),
            io: Duration::from_secs(2),
        },
        ready_attempts: 2,
        ready_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

pub const STATS_REPLY: &[u8] = b"POOLS: 1\n\nSTATE: VALID PRIMARY\nTHREADS: live 1  idle 0 max 12 idle-timeout 30\nQUEUE: 0 items\n\tSTATS 0.000394\n\nMEMSTATS: heap N/A mmap N/A used N/A free N/A releasable N/A pools 1 pools_used 1306.837M pools_total 1306.882M\nEND\0";
