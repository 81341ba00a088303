use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::error::FetchError;
use super::types::{DetailsEnvelope, DetailsResponse, MissingReason, RemoteDetail, RemoteDetailBatch};
use super::{DetailSource, FetchOutcome};
use crate::store::ItemId;

pub const DEFAULT_API_BASE: &str = "https://api.steampowered.com";

/// Details endpoint, relative to the API base.
const DETAILS_PATH: &str = "/ISteamRemoteStorage/GetPublishedFileDetails/v1/";

/// Steam rejects very large `itemcount` values, so requests are split.
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Read-only client for `ISteamRemoteStorage/GetPublishedFileDetails`.
///
/// The endpoint needs no API key. Every request carries the configured
/// timeout, and the first timed-out chunk abandons the whole fetch, so a
/// stalled server costs at most one timeout per cycle.
#[derive(Debug, Clone)]
pub struct SteamClient {
    client: Client,
    endpoint: String,
    batch_size: usize,
}

impl SteamClient {
    pub fn new(api_base: &str, timeout: Duration, batch_size: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("workshop-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", api_base.trim_end_matches('/'), DETAILS_PATH),
            batch_size: batch_size.max(1),
        })
    }

    /// POST one chunk of IDs and decode the envelope.
    async fn fetch_chunk(&self, ids: &[ItemId]) -> Result<DetailsResponse, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&details_form(ids))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let envelope: DetailsEnvelope = response.json().await?;
        Ok(envelope.response)
    }
}

/// Form body for one request: `itemcount` plus indexed `publishedfileids[i]`.
fn details_form(ids: &[ItemId]) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(ids.len() + 1);
    form.push(("itemcount".to_string(), ids.len().to_string()));
    form.extend(
        ids.iter()
            .enumerate()
            .map(|(i, id)| (format!("publishedfileids[{}]", i), id.to_string())),
    );
    form
}

#[async_trait]
impl DetailSource for SteamClient {
    async fn fetch(&self, ids: &[ItemId]) -> FetchOutcome {
        let mut batch = RemoteDetailBatch::new();
        if ids.is_empty() {
            return FetchOutcome::Fetched(batch);
        }

        let chunks: Vec<&[ItemId]> = ids.chunks(self.batch_size).collect();
        let total = chunks.len();
        let mut last_error: Option<FetchError> = None;
        let mut failed = 0usize;

        for (index, chunk) in chunks.into_iter().enumerate() {
            match self.fetch_chunk(chunk).await {
                Ok(response) => {
                    tracing::debug!(
                        chunk = index + 1,
                        requested = chunk.len(),
                        returned = response.publishedfiledetails.len(),
                        result = ?response.result,
                        resultcount = ?response.resultcount,
                        "Fetched Workshop details"
                    );
                    batch.extend(RemoteDetailBatch::from_response(chunk, response));
                }
                Err(FetchError::Timeout) => {
                    // The host is not answering; later chunks would only
                    // wait out the same timeout.
                    tracing::warn!(
                        chunk = index + 1,
                        chunks = total,
                        "Workshop details request timed out, abandoning this fetch"
                    );
                    return FetchOutcome::Failed {
                        reason: FetchError::Timeout.to_string(),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        chunk = index + 1,
                        chunks = total,
                        error = %e,
                        "Workshop details request failed"
                    );
                    batch.extend(
                        chunk
                            .iter()
                            .map(|id| (*id, RemoteDetail::Missing(MissingReason::RequestFailed))),
                    );
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        tracing::debug!(
            count = batch.len(),
            failed_chunks = failed,
            "Workshop details fetch finished"
        );

        match last_error {
            Some(e) if failed == total => FetchOutcome::Failed {
                reason: e.to_string(),
            },
            _ => FetchOutcome::Fetched(batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::store::types::id;

    /// Minimal HTTP/1.1 stub: parses the requested IDs out of each form body
    /// and replies with whatever `handler` returns.
    async fn spawn_stub<F>(handler: F) -> (String, Arc<AtomicUsize>)
    where
        F: Fn(Vec<u64>) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let hits_task = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let hits = hits_task.clone();
                tokio::spawn(async move {
                    let body = read_request_body(&mut socket).await;
                    hits.fetch_add(1, Ordering::SeqCst);
                    let (status, json) = handler(requested_ids(&body));
                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        json.len(),
                        json
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), hits)
    }

    async fn read_request_body(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = end + 4;
            if buf.len() >= start + len {
                return String::from_utf8_lossy(&buf[start..start + len]).into_owned();
            }
        }
    }

    fn requested_ids(body: &str) -> Vec<u64> {
        body.split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(k, _)| k.starts_with("publishedfileids"))
            .filter_map(|(_, v)| v.parse().ok())
            .collect()
    }

    /// Reply with `time_updated = id * 10` for every requested ID, reversed
    /// so positional matching would get it wrong.
    fn echo_details(ids: Vec<u64>) -> (u16, String) {
        let records: Vec<serde_json::Value> = ids
            .iter()
            .rev()
            .map(|n| {
                serde_json::json!({
                    "publishedfileid": n.to_string(),
                    "result": 1,
                    "time_updated": n * 10,
                })
            })
            .collect();
        let body = serde_json::json!({
            "response": {
                "result": 1,
                "resultcount": records.len(),
                "publishedfiledetails": records,
            }
        });
        (200, body.to_string())
    }

    fn client(base: &str, batch_size: usize) -> SteamClient {
        SteamClient::new(base, Duration::from_secs(5), batch_size).unwrap()
    }

    fn fetched(outcome: FetchOutcome) -> RemoteDetailBatch {
        match outcome {
            FetchOutcome::Fetched(batch) => batch,
            FetchOutcome::Failed { reason } => panic!("fetch failed: {}", reason),
        }
    }

    #[test]
    fn test_details_form_layout() {
        let form = details_form(&[id(100), id(200)]);
        assert_eq!(
            form,
            vec![
                ("itemcount".to_string(), "2".to_string()),
                ("publishedfileids[0]".to_string(), "100".to_string()),
                ("publishedfileids[1]".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn test_endpoint_joins_base() {
        let c = client("http://example.invalid/", 10);
        assert_eq!(
            c.endpoint,
            "http://example.invalid/ISteamRemoteStorage/GetPublishedFileDetails/v1/"
        );
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(client("http://example.invalid", 0).batch_size, 1);
    }

    #[tokio::test]
    async fn test_fetch_empty_makes_no_request() {
        let (base, hits) = spawn_stub(echo_details).await;
        let batch = fetched(client(&base, 10).fetch(&[]).await);
        assert!(batch.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_matches_reordered_response() {
        let (base, hits) = spawn_stub(echo_details).await;
        let batch = fetched(client(&base, 10).fetch(&[id(1), id(2), id(3)]).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(batch.get(id(1)), Some(RemoteDetail::Updated(10)));
        assert_eq!(batch.get(id(2)), Some(RemoteDetail::Updated(20)));
        assert_eq!(batch.get(id(3)), Some(RemoteDetail::Updated(30)));
    }

    #[tokio::test]
    async fn test_fetch_splits_into_chunks() {
        let (base, hits) = spawn_stub(echo_details).await;
        let ids: Vec<ItemId> = (1..=5).map(id).collect();
        let batch = fetched(client(&base, 2).fetch(&ids).await);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.get(id(5)), Some(RemoteDetail::Updated(50)));
    }

    #[tokio::test]
    async fn test_partial_chunk_failure_marks_chunk_missing() {
        let (base, _) = spawn_stub(|ids| {
            if ids.contains(&3) {
                (500, "{}".to_string())
            } else {
                echo_details(ids)
            }
        })
        .await;
        let ids: Vec<ItemId> = (1..=4).map(id).collect();
        let batch = fetched(client(&base, 2).fetch(&ids).await);
        assert_eq!(batch.get(id(1)), Some(RemoteDetail::Updated(10)));
        assert_eq!(
            batch.get(id(3)),
            Some(RemoteDetail::Missing(MissingReason::RequestFailed))
        );
        assert_eq!(
            batch.get(id(4)),
            Some(RemoteDetail::Missing(MissingReason::RequestFailed))
        );
    }

    #[tokio::test]
    async fn test_all_chunks_failing_is_fetch_failure() {
        let (base, _) = spawn_stub(|_| (503, "{}".to_string())).await;
        let outcome = client(&base, 1).fetch(&[id(1), id(2)]).await;
        match outcome {
            FetchOutcome::Failed { reason } => assert!(reason.contains("503"), "{}", reason),
            FetchOutcome::Fetched(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_fetch_failure() {
        let (base, _) = spawn_stub(|_| (200, "<html>busy</html>".to_string())).await;
        let outcome = client(&base, 10).fetch(&[id(1)]).await;
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_failure() {
        let outcome = client("http://127.0.0.1:1", 10).fetch(&[id(1)]).await;
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let c = SteamClient::new(&format!("http://{}", addr), Duration::from_millis(200), 10)
            .unwrap();
        let started = std::time::Instant::now();
        let outcome = c.fetch(&[id(1)]).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        match outcome {
            FetchOutcome::Failed { reason } => assert!(reason.contains("timed out"), "{}", reason),
            FetchOutcome::Fetched(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_timeout_abandons_remaining_chunks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let seen = connections.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                seen.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let c = SteamClient::new(&format!("http://{}", addr), Duration::from_millis(300), 1)
            .unwrap();
        let ids: Vec<ItemId> = (1..=5).map(id).collect();
        let started = std::time::Instant::now();
        let outcome = c.fetch(&ids).await;
        let elapsed = started.elapsed();

        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}
