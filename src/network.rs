//! Peer registry and chain fetching
//!
//! Peers are identified only by their network location (`host:port`). There
//! is no handshake and no identity check; a peer is whatever answers
//! `GET http://{peer}/chain`.

use crate::blockchain::Block;
use crate::error::ChainError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default bound on a single peer fetch.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// A peer's network location, normalized to `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peer(String);

impl Peer {
    /// Accepts `http://host:port/anything` or bare `host:port`.
    pub fn parse(address: &str) -> Result<Self, ChainError> {
        let address = address.trim();

        let location = if address.contains("://") {
            let url = Url::parse(address)
                .map_err(|e| ChainError::InvalidPeer(format!("{}: {}", address, e)))?;
            let host = url
                .host_str()
                .ok_or_else(|| ChainError::InvalidPeer(format!("{}: missing host", address)))?;
            match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }
        } else {
            address.split('/').next().unwrap_or_default().to_string()
        };

        if location.is_empty() || location.chars().any(char::is_whitespace) {
            return Err(ChainError::InvalidPeer(format!("'{}'", address)));
        }
        Ok(Peer(location))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chain_url(&self) -> String {
        format!("http://{}/chain", self.0)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered peers, iterated in a stable order.
#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    peers: BTreeSet<Peer>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the peer was not yet registered.
    pub fn insert(&mut self, peer: Peer) -> bool {
        self.peers.insert(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    pub fn to_vec(&self) -> Vec<Peer> {
        self.peers.iter().cloned().collect()
    }
}

/// Body of `GET /chain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Source of peer chains for conflict resolution.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &Peer) -> Result<ChainResponse, ChainError>;
}

/// Fetches peer chains over HTTP with a per-request timeout.
#[derive(Clone)]
pub struct HttpChainFetcher {
    client: Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &Peer) -> Result<ChainResponse, ChainError> {
        let resp = self.client.get(peer.chain_url()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::NetworkError(format!(
                "{} answered {}",
                peer, status
            )));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            ChainError::SerializationError(format!("Malformed chain from {}: {}", peer, e))
        })
    }
}
