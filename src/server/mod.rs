use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread,
};

use anyhow::Context;
use openssl::ssl::{NameType, SslAcceptor};
use tracing::{error, info};

/// Accepts TCP connections and terminates TLS on each with the configured
/// acceptor. Connection handling is minimal: certificate selection has
/// already happened in the servername callback by the time this layer
/// sees application bytes.
pub struct Server {
    acceptor: SslAcceptor,
    listen: String,
}

impl Server {
    pub fn new(acceptor: SslAcceptor, listen: &str) -> Self {
        Server {
            acceptor,
            listen: listen.to_string(),
        }
    }

    /// Blocks on the listener forever, one handling thread per connection.
    pub fn run(&self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(&self.listen)
            .with_context(|| format!("binding TLS listener on {} failed", self.listen))?;
        info!("listening on {}", self.listen);

        for stream in listener.incoming() {
            match stream {
                Ok(sock) => {
                    let acceptor = self.acceptor.clone();
                    thread::spawn(move || handle_connection(&acceptor, sock));
                }
                Err(err) => error!("accepting connection failed: {err}"),
            }
        }

        Ok(())
    }
}

fn handle_connection(acceptor: &SslAcceptor, sock: TcpStream) {
    let peer = sock
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());

    let mut tls = match acceptor.accept(sock) {
        Ok(tls) => tls,
        Err(err) => {
            info!("handshake with {peer} failed: {err}");
            return;
        }
    };

    let servername = tls
        .ssl()
        .servername(NameType::HOST_NAME)
        .unwrap_or("<none>")
        .to_owned();
    info!("handshake complete for {peer} (sni: {servername})");

    // Drain whatever request line arrives and answer with a marker body so
    // certificate selection can be probed with any HTTPS client.
    let mut buf = [0_u8; 4096];
    let _ = tls.read(&mut buf);

    let body = format!("snigate serving {servername}\n");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(err) = tls.write_all(response.as_bytes()) {
        info!("writing response to {peer} failed: {err}");
    }
    let _ = tls.shutdown();
}
