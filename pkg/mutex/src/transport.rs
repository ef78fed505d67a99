use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use pkg_constants::network::{
    DEFAULT_REPLICA_PORT, INTERNAL_MESSAGE_PATH, MESSAGE_RETRY_BASE_DELAY_MS,
    MESSAGE_SEND_ATTEMPTS, MESSAGE_SEND_TIMEOUT_SECS,
};
use pkg_types::message::PeerMessage;

/// Delivers protocol messages to peers by id.
///
/// The node never holds peer objects, only ids; resolution to an address is
/// the transport's business. Tests swap in a channel-backed implementation.
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    async fn send(&self, peer_id: &str, msg: &PeerMessage) -> anyhow::Result<()>;
}

/// Maps peer ids to base URLs.
///
/// Built from `id=base_url` specs; a bare `id` falls back to
/// `http://{id}:8081`, matching the compose-file service naming.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    urls: HashMap<String, String>,
}

impl PeerDirectory {
    pub fn parse(specs: &[String]) -> Self {
        let mut urls = HashMap::new();
        for spec in specs {
            let spec = spec.trim();
            if spec.is_empty() {
                continue;
            }
            match spec.split_once('=') {
                Some((id, url)) => {
                    urls.insert(id.trim().to_string(), url.trim().to_string());
                }
                None => {
                    urls.insert(
                        spec.to_string(),
                        format!("http://{}:{}", spec, DEFAULT_REPLICA_PORT),
                    );
                }
            }
        }
        Self { urls }
    }

    /// All known peer ids, in stable order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.urls.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Full URL of a peer's message endpoint.
    pub fn message_url(&self, peer_id: &str) -> String {
        let base = self
            .urls
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| format!("http://{}:{}", peer_id, DEFAULT_REPLICA_PORT));
        format!("{}{}", base.trim_end_matches('/'), INTERNAL_MESSAGE_PATH)
    }
}

/// HTTP transport with bounded retries.
///
/// Each attempt has its own deadline; retries back off exponentially. A
/// terminal failure is reported to the caller, which logs it; the protocol
/// itself never re-queues.
pub struct HttpTransport {
    client: reqwest::Client,
    directory: PeerDirectory,
}

impl HttpTransport {
    pub fn new(directory: PeerDirectory) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(MESSAGE_SEND_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, directory })
    }
}

#[async_trait]
impl MessageTransport for HttpTransport {
    async fn send(&self, peer_id: &str, msg: &PeerMessage) -> anyhow::Result<()> {
        let url = self.directory.message_url(peer_id);
        let mut delay = Duration::from_millis(MESSAGE_RETRY_BASE_DELAY_MS);
        let mut last_error = String::new();

        for attempt in 1..=MESSAGE_SEND_ATTEMPTS {
            match self.client.post(&url).json(msg).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_error = format!("peer answered {}", resp.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            if attempt < MESSAGE_SEND_ATTEMPTS {
                warn!(
                    "Send to {} failed (attempt {}/{}): {}",
                    peer_id, attempt, MESSAGE_SEND_ATTEMPTS, last_error
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(anyhow::anyhow!(
            "could not reach {} after {} attempts: {}",
            peer_id,
            MESSAGE_SEND_ATTEMPTS,
            last_error
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_and_bare_specs() {
        let directory = PeerDirectory::parse(&[
            "server2=http://server2:8082".to_string(),
            "server3".to_string(),
        ]);
        assert_eq!(directory.ids(), vec!["server2", "server3"]);
        assert_eq!(
            directory.message_url("server2"),
            "http://server2:8082/internal/message"
        );
        assert_eq!(
            directory.message_url("server3"),
            "http://server3:8081/internal/message"
        );
    }

    #[test]
    fn skips_blank_entries_and_trims() {
        let directory =
            PeerDirectory::parse(&["".to_string(), " server2 = http://s2:9000/ ".to_string()]);
        assert_eq!(directory.ids(), vec!["server2"]);
        assert_eq!(
            directory.message_url("server2"),
            "http://s2:9000/internal/message"
        );
    }

    #[test]
    fn unknown_peer_gets_the_fallback_url() {
        let directory = PeerDirectory::default();
        assert_eq!(
            directory.message_url("server9"),
            "http://server9:8081/internal/message"
        );
    }
}
