//! Command surface: the six pipeline operations and their bus endpoints.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::bus::{InProcessBus, Message, MessageBus};
use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::error::ServiceError;
use crate::ingest::{parse_id, Dispatcher, Fetcher, ItemProcessor, ProcessOutcome};
use crate::item::IDS_LATEST_KEY;
use crate::rank::{Ranker, TopPosts, TopQuery};
use crate::store::{ItemStore, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    FetchIds,
    ListIds,
    ProcessId,
    ProcessIdReply,
    Sort,
    Top,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::FetchIds,
        Endpoint::ListIds,
        Endpoint::ProcessId,
        Endpoint::ProcessIdReply,
        Endpoint::Sort,
        Endpoint::Top,
    ];

    pub fn subject(self) -> &'static str {
        match self {
            Endpoint::FetchIds => "hn.fetch.ids",
            Endpoint::ListIds => "hn.fetch.list",
            Endpoint::ProcessId => "hn.process.id",
            Endpoint::ProcessIdReply => "hn.process.id.reply",
            Endpoint::Sort => "hn.sort.ids",
            Endpoint::Top => "hn.sort.top",
        }
    }

    pub fn queue_group(self) -> &'static str {
        match self {
            Endpoint::FetchIds | Endpoint::ListIds => "fetch-group",
            Endpoint::ProcessId | Endpoint::ProcessIdReply => "process-group",
            Endpoint::Sort | Endpoint::Top => "sort-group",
        }
    }

    fn workers(self, cfg: &WorkerConfig) -> usize {
        let n = match self {
            Endpoint::FetchIds | Endpoint::ListIds => cfg.fetch,
            Endpoint::ProcessId | Endpoint::ProcessIdReply => cfg.process,
            Endpoint::Sort | Endpoint::Top => cfg.sort,
        };
        n.max(1)
    }
}

/// Reply body for a reply-mode process of an id that is not a story.
#[derive(Debug, Serialize)]
struct SkippedReply {
    id: u64,
    skipped: String,
}

pub struct HnService {
    fetcher: Arc<dyn Fetcher>,
    items: Arc<dyn ItemStore>,
    dispatcher: Dispatcher,
    processor: ItemProcessor,
    ranker: Ranker,
    top: TopQuery,
}

impl HnService {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        items: Arc<dyn ItemStore>,
        snapshots: Arc<dyn SnapshotStore>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        crate::store::ensure_metrics_described();
        Self {
            dispatcher: Dispatcher::new(items.clone(), bus, Endpoint::ProcessId.subject()),
            processor: ItemProcessor::new(fetcher.clone(), items.clone()),
            ranker: Ranker::new(items.clone(), snapshots.clone(), clock),
            top: TopQuery::new(snapshots),
            fetcher,
            items,
        }
    }

    /// `fetch-ids`: list candidates upstream and dispatch them.
    pub async fn fetch_ids(&self) -> Result<String, ServiceError> {
        tracing::info!(target: "service", source = self.fetcher.name(), "fetching candidate ids");
        let ids = self.fetcher.list_candidate_ids().await.map_err(|e| {
            tracing::error!(target: "service", error = %e, "failed to fetch candidate ids");
            ServiceError::from(e)
        })?;
        let n = self.dispatcher.dispatch(&ids).await?;
        Ok(format!("Fetched {n} post IDs"))
    }

    /// `list-ids`: the raw JSON id list written by the last fetch.
    pub async fn list_ids(&self) -> Result<Vec<u8>, ServiceError> {
        match self.items.get(IDS_LATEST_KEY).await? {
            Some(e) => Ok(e.value),
            None => Err(ServiceError::NotFound(
                "no candidate ids fetched yet; run fetch to populate the store".into(),
            )),
        }
    }

    /// `process-id`: no reply, failures only reach the log.
    pub async fn process_id(&self, payload: &[u8]) {
        match parse_id(payload) {
            Ok(id) => self.processor.process_and_forget(id).await,
            Err(e) => tracing::warn!(target: "service", error = %e, "dropping process request"),
        }
    }

    /// `process-id-reply`: the stored item, a skip notice, or a typed error.
    pub async fn process_id_reply(&self, payload: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let id = parse_id(payload)?;
        let body = match self.processor.process(id).await? {
            ProcessOutcome::Stored(item) => serde_json::to_vec(&item),
            ProcessOutcome::Skipped(reason) => serde_json::to_vec(&SkippedReply {
                id,
                skipped: reason.to_string(),
            }),
        };
        body.map_err(|source| ServiceError::Encode {
            what: "process reply",
            source,
        })
    }

    /// `sort`: build today's ranked snapshot.
    pub async fn sort(&self) -> Result<String, ServiceError> {
        let summary = self.ranker.build_snapshot().await?;
        Ok(format!("Stored HackerNews sorted posts: {}", summary.name))
    }

    /// `top`: the first `count` entries of the newest snapshot.
    pub async fn top(&self, payload: &[u8]) -> Result<TopPosts, ServiceError> {
        let n = parse_count(payload)?;
        self.top.top(n).await
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    async fn reply_for(&self, endpoint: Endpoint, payload: &[u8]) -> Result<Vec<u8>, ServiceError> {
        match endpoint {
            Endpoint::FetchIds => self.fetch_ids().await.map(String::into_bytes),
            Endpoint::ListIds => self.list_ids().await,
            Endpoint::ProcessIdReply => self.process_id_reply(payload).await,
            Endpoint::Sort => self.sort().await.map(String::into_bytes),
            Endpoint::Top => {
                let top = self.top(payload).await?;
                serde_json::to_vec(&top).map_err(|source| ServiceError::Encode {
                    what: "top posts",
                    source,
                })
            }
            Endpoint::ProcessId => {
                self.process_id(payload).await;
                Ok(Vec::new())
            }
        }
    }

    /// Run one delivered message through its endpoint. `process-id` never
    /// answers, even when the sender waits for a reply.
    pub async fn handle(&self, endpoint: Endpoint, mut msg: Message) {
        let result = self.reply_for(endpoint, msg.data()).await;
        if endpoint == Endpoint::ProcessId {
            return;
        }
        match result {
            Ok(body) => {
                msg.respond(body);
            }
            Err(e) => {
                tracing::warn!(
                    target: "service",
                    subject = endpoint.subject(),
                    code = e.code(),
                    error = %e,
                    "request failed"
                );
                let reply = e.to_reply();
                msg.error(reply.code, reply.description);
            }
        }
    }

    /// Subscribe worker tasks for every endpoint. Workers sharing an
    /// endpoint join its queue group, so each message reaches one of them.
    pub fn serve(self: &Arc<Self>, bus: &InProcessBus, workers: &WorkerConfig) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for endpoint in Endpoint::ALL {
            for _ in 0..endpoint.workers(workers) {
                let mut sub = bus.subscribe(endpoint.subject(), Some(endpoint.queue_group()));
                let svc = Arc::clone(self);
                handles.push(tokio::spawn(async move {
                    while let Some(msg) = sub.next().await {
                        svc.handle(endpoint, msg).await;
                    }
                }));
            }
        }
        tracing::info!(target: "service", workers = handles.len(), "service workers started");
        handles
    }
}

/// Parse a `top` count sent as text. Zero and negatives are rejected.
pub fn parse_count(raw: &[u8]) -> Result<i64, ServiceError> {
    let s = String::from_utf8_lossy(raw);
    let n: i64 = s.trim().parse().map_err(|_| {
        ServiceError::InvalidArgument(format!(
            "invalid count {:?}; must be a positive integer",
            s.trim()
        ))
    })?;
    if n < 1 {
        return Err(ServiceError::InvalidArgument(
            "count must be a positive integer".into(),
        ));
    }
    Ok(n)
}
