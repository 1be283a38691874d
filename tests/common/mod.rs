//! Local mutual-TLS gateway used by the integration tests.
//!
//! Certificates come from a throwaway CA generated with rcgen. The gateway
//! follows a per-connection script so tests can make the peer vanish or refuse
//! handshakes on demand.

#![allow(dead_code)]

use pushlink::connection::ConnectionConfig;
use pushlink::events::ConnectionEvents;
use pushlink::Error;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// CA, server certificate and client credentials written to a temp dir
pub struct Pki {
    _dir: TempDir,
    /// Combined client certificate + key
    pub client_pem: PathBuf,
    /// CA bundle that signed the server certificate
    pub ca_pem: PathBuf,
    server_config: Arc<ServerConfig>,
}

impl Pki {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "pushlink test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let mut server_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        server_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let server_cert = server_params
            .signed_by(&server_key, &ca_cert, &ca_key)
            .unwrap();

        let client_key = KeyPair::generate().unwrap();
        let mut client_params = CertificateParams::new(vec!["push-client".to_string()]).unwrap();
        client_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let client_cert = client_params
            .signed_by(&client_key, &ca_cert, &ca_key)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let client_pem = dir.path().join("client.pem");
        std::fs::write(
            &client_pem,
            format!("{}{}", client_cert.pem(), client_key.serialize_pem()),
        )
        .unwrap();
        let ca_pem = dir.path().join("ca.pem");
        std::fs::write(&ca_pem, ca_cert.pem()).unwrap();

        let mut client_roots = RootCertStore::empty();
        client_roots.add(ca_cert.der().clone()).unwrap();
        let verifier = WebPkiClientVerifier::builder(Arc::new(client_roots))
            .build()
            .unwrap();

        let server_chain: Vec<CertificateDer<'static>> = vec![server_cert.der().clone()];
        let server_key =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(server_key.serialize_der()));
        let server_config = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(server_chain, server_key)
            .unwrap();

        Self {
            _dir: dir,
            client_pem,
            ca_pem,
            server_config: Arc::new(server_config),
        }
    }
}

/// What the gateway does with one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Handshake, then echo everything back
    Serve,
    /// Close the TCP connection before the handshake
    Refuse,
    /// Handshake, then hang up without a close alert
    Vanish,
    /// Handshake, send the bytes, then hang up without a close alert
    SayAndVanish(&'static [u8]),
    /// Handshake, send the bytes, then close cleanly with close_notify
    SayGoodbye(&'static [u8]),
}

/// Scripted gateway bound to 127.0.0.1
pub struct Gateway {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<u8>>>,
    vanished: mpsc::UnboundedReceiver<()>,
}

impl Gateway {
    /// Start a gateway that serves every connection
    pub async fn serving(pki: &Pki) -> Self {
        Self::start(pki, Vec::<Behavior>::new()).await
    }

    /// Start a gateway; connections beyond `script` are served normally
    pub async fn start(pki: &Pki, script: impl IntoIterator<Item = Behavior>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = TlsAcceptor::from(pki.server_config.clone());

        let accepted = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let (vanished_tx, vanished) = mpsc::unbounded_channel();
        let mut script: VecDeque<Behavior> = script.into_iter().collect();

        let counter = accepted.clone();
        let sink = received.clone();
        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let behavior = script.pop_front().unwrap_or(Behavior::Serve);

                let acceptor = acceptor.clone();
                let sink = sink.clone();
                let vanished_tx = vanished_tx.clone();
                tokio::spawn(async move {
                    match behavior {
                        Behavior::Refuse => drop(tcp),
                        Behavior::Vanish => {
                            if let Ok(tls) = acceptor.accept(tcp).await {
                                drop(tls);
                                let _ = vanished_tx.send(());
                            }
                        }
                        Behavior::SayAndVanish(bytes) => {
                            if let Ok(mut tls) = acceptor.accept(tcp).await {
                                let _ = tls.write_all(bytes).await;
                                let _ = tls.flush().await;
                                drop(tls);
                                let _ = vanished_tx.send(());
                            }
                        }
                        Behavior::SayGoodbye(bytes) => {
                            if let Ok(mut tls) = acceptor.accept(tcp).await {
                                let _ = tls.write_all(bytes).await;
                                let _ = tls.shutdown().await;
                                drop(tls);
                                let _ = vanished_tx.send(());
                            }
                        }
                        Behavior::Serve => {
                            let Ok(mut tls) = acceptor.accept(tcp).await else {
                                return;
                            };
                            let mut buf = [0u8; 1024];
                            loop {
                                match tls.read(&mut buf).await {
                                    Ok(0) | Err(_) => return,
                                    Ok(n) => {
                                        sink.lock().unwrap().extend_from_slice(&buf[..n]);
                                        if tls.write_all(&buf[..n]).await.is_err() {
                                            return;
                                        }
                                        let _ = tls.flush().await;
                                    }
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            port,
            accepted,
            received,
            vanished,
        }
    }

    /// Client configuration pointing at this gateway
    pub fn config(&self, pki: &Pki) -> ConnectionConfig {
        ConnectionConfig::builder()
            .certificate(&pki.client_pem)
            .ca_cert(&pki.ca_pem)
            .host("localhost")
            .port(self.port)
            .build()
            .unwrap()
    }

    /// TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Bytes received by serving connections
    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until a `Vanish` or `Say*` connection has hung up and the FIN had time to
    /// reach the client
    pub async fn wait_vanished(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.vanished.recv())
            .await
            .expect("gateway never hung up")
            .expect("gateway task ended");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Event sink that records what it is told
#[derive(Default)]
pub struct RecordingEvents {
    opened: AtomicUsize,
    closed: AtomicUsize,
    retries: Mutex<Vec<(&'static str, u32, String)>>,
}

impl RecordingEvents {
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> Vec<(&'static str, u32, String)> {
        self.retries.lock().unwrap().clone()
    }
}

impl ConnectionEvents for RecordingEvents {
    fn opened(&self, _host: &str, _port: u16) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self, _host: &str, _port: u16) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn retrying(&self, operation: &'static str, attempt: u32, error: &Error) {
        self.retries
            .lock()
            .unwrap()
            .push((operation, attempt, error.to_string()));
    }
}
