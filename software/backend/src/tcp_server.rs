// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <tcp_server.rs>

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::error::ConnectionError;
use crate::json::encode_record;
use crate::record::Record;
use crate::sink::Sink;

type Clients = Arc<Mutex<Vec<TcpStream>>>;

/// Forwards records as JSON lines to every connected TCP client.
///
/// Writes never block the read loop: a client that cannot take a whole line
/// right away is disconnected.
pub struct TcpFanout {
    local_addr: SocketAddr,
    clients: Clients,
    accept_task: JoinHandle<()>,
}

impl TcpFanout {
    /// Binds `addr` and starts accepting clients in the background.
    pub async fn bind(addr: &str) -> Result<Self, ConnectionError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ConnectionError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        log::info!("[TCP] listening on {}", local_addr);

        let clients = Clients::default();
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&clients)));
        Ok(Self {
            local_addr,
            clients,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn broadcast(&self, line: &str) {
        let bytes = line.as_bytes();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|stream| match stream.try_write(bytes) {
            Ok(n) if n == bytes.len() => true,
            Ok(n) => {
                log::warn!("[TCP] short write ({} of {} bytes), dropping client", n, bytes.len());
                false
            }
            Err(e) => {
                log::warn!("[TCP] dropping client: {}", e);
                false
            }
        });
    }
}

impl Drop for TcpFanout {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl Sink for TcpFanout {
    fn emit(&mut self, record: &Record) {
        let mut line = encode_record(record);
        line.push('\n');
        self.broadcast(&line);
    }
}

async fn accept_loop(listener: TcpListener, clients: Clients) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                log::info!("[TCP] new client: {}", addr);
                stream.set_nodelay(true).ok();
                clients
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(stream);
            }
            Err(e) => log::warn!("[TCP] accept failed: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StatusMessage;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn clients_receive_json_lines() {
        let mut fanout = TcpFanout::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(fanout.local_addr()).await.unwrap();

        for _ in 0..100 {
            if fanout.client_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fanout.client_count(), 1);

        let record = Record::Status(StatusMessage {
            status: "LINK".into(),
            value: "UP".into(),
            tx_queue_full: None,
        });
        fanout.emit(&record);

        let mut lines = BufReader::new(client).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(crate::json::decode_line(line.as_bytes()).unwrap(), record);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = TcpFanout::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().to_string();
        assert!(matches!(
            TcpFanout::bind(&taken).await,
            Err(ConnectionError::Bind { .. })
        ));
    }
}
