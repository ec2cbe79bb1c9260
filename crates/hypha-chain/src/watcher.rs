//! Live governance event subscriptions
//!
//! A subscription registers a log filter with a [`LogSource`], counts itself
//! in the [`ListenerRegistry`] and yields decoded [`GovernanceEvent`]s.
//! Dropping the subscription drops the underlying log stream and releases
//! the registry slot in the same call.

use crate::config::ChainConfig;
use crate::error::{classify_transport_error, ChainError, Result};
use crate::events::{uint_topic, GovernanceEvent, GovernanceEventKind, RawLog};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use async_stream::stream;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Address + topic filter for one subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogFilter {
    pub address: Address,
    pub event: B256,
    pub topic1: Option<B256>,
}

impl LogFilter {
    pub fn matches(&self, log: &RawLog) -> bool {
        log.address.is_none_or(|a| a == self.address)
            && log.topics.first() == Some(&self.event)
            && self
                .topic1
                .is_none_or(|t| log.topics.get(1) == Some(&t))
    }
}

/// Source of live logs matching a filter
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn subscribe(&self, filter: &LogFilter) -> Result<BoxStream<'static, RawLog>>;
}

/// [`LogSource`] polling an HTTP node with `eth_newFilter` / `eth_getFilterChanges`
pub struct AlloyLogSource {
    rpc_url: String,
    poll_interval: Duration,
    provider: OnceCell<DynProvider>,
}

impl AlloyLogSource {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            poll_interval: Duration::from_millis(config.log_poll_interval_ms),
            provider: OnceCell::new(),
        }
    }

    async fn provider(&self) -> Result<&DynProvider> {
        self.provider
            .get_or_try_init(|| async {
                let rpc_url = self
                    .rpc_url
                    .parse()
                    .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {}", e)))?;
                Ok(ProviderBuilder::new().connect_http(rpc_url).erased())
            })
            .await
    }
}

#[async_trait]
impl LogSource for AlloyLogSource {
    async fn subscribe(&self, filter: &LogFilter) -> Result<BoxStream<'static, RawLog>> {
        let provider = self.provider().await?;

        let mut rpc_filter = Filter::new()
            .address(filter.address)
            .event_signature(filter.event)
            .from_block(BlockNumberOrTag::Latest);
        if let Some(topic1) = filter.topic1 {
            rpc_filter = rpc_filter.topic1(topic1);
        }

        let poller = provider
            .watch_logs(&rpc_filter)
            .await
            .map_err(|e| classify_transport_error(&e, "eth_newFilter"))?
            .with_poll_interval(self.poll_interval);
        let mut batches = poller.into_stream();

        let event = filter.event;
        let logs = stream! {
            while let Some(batch) = batches.next().await {
                for log in batch {
                    yield RawLog::from(log);
                }
            }
            debug!("Log poller for topic {} ended", event);
        };
        Ok(logs.boxed())
    }
}

/// Live listener counts per filter
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    counts: Arc<Mutex<HashMap<LogFilter, usize>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new listener; the slot is released when the guard drops
    pub fn register(&self, filter: LogFilter) -> ListenerGuard {
        *self.counts.lock().entry(filter.clone()).or_insert(0) += 1;
        ListenerGuard {
            registry: self.clone(),
            filter,
        }
    }

    pub fn count(&self, filter: &LogFilter) -> usize {
        self.counts.lock().get(filter).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }
}

/// Registry slot held by a live subscription
pub struct ListenerGuard {
    registry: ListenerRegistry,
    filter: LogFilter,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let mut counts = self.registry.counts.lock();
        if let Some(count) = counts.get_mut(&self.filter) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.filter);
            }
        }
        debug!("Released listener for topic {}", self.filter.event);
    }
}

/// Stream of decoded events for one filter
pub struct EventSubscription {
    logs: BoxStream<'static, RawLog>,
    kind: GovernanceEventKind,
    _guard: ListenerGuard,
}

impl Stream for EventSubscription {
    type Item = GovernanceEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let log = match self.logs.poll_next_unpin(cx) {
                Poll::Ready(Some(log)) => log,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            };
            match self.kind.decode(std::slice::from_ref(&log), true) {
                Ok(mut events) if !events.is_empty() => {
                    return Poll::Ready(Some(events.swap_remove(0)))
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Dropping undecodable {} log: {}", self.kind.name(), e);
                    continue;
                }
            }
        }
    }
}

/// Subscribes to per-proposal outcome events on the proposals contract
#[derive(Clone)]
pub struct ProposalEventWatcher {
    source: Arc<dyn LogSource>,
    registry: ListenerRegistry,
    proposals: Address,
}

impl ProposalEventWatcher {
    pub fn new(source: Arc<dyn LogSource>, registry: ListenerRegistry, proposals: Address) -> Self {
        Self {
            source,
            registry,
            proposals,
        }
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Filter for `kind` events about `proposal_id`
    pub fn filter(&self, kind: GovernanceEventKind, proposal_id: U256) -> LogFilter {
        LogFilter {
            address: self.proposals,
            event: kind.signature_hash(),
            topic1: Some(uint_topic(proposal_id)),
        }
    }

    pub async fn subscribe(
        &self,
        kind: GovernanceEventKind,
        proposal_id: U256,
    ) -> Result<EventSubscription> {
        let filter = self.filter(kind, proposal_id);
        let guard = self.registry.register(filter.clone());
        let logs = self.source.subscribe(&filter).await?;
        info!(
            "Subscribed to {} for proposal {} ({} listeners)",
            kind.name(),
            proposal_id,
            self.registry.count(&filter)
        );
        Ok(EventSubscription {
            logs,
            kind,
            _guard: guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::{executed_log, proposal_created_log};
    use crate::testing::ChannelLogSource;

    fn watcher(source: Arc<ChannelLogSource>) -> ProposalEventWatcher {
        ProposalEventWatcher::new(
            source,
            ListenerRegistry::new(),
            Address::repeat_byte(0x02),
        )
    }

    #[tokio::test]
    async fn test_subscription_forwards_matching_events() {
        let source = Arc::new(ChannelLogSource::new());
        let watcher = watcher(source.clone());
        let mut sub = watcher
            .subscribe(GovernanceEventKind::ProposalExecuted, U256::from(5))
            .await
            .unwrap();

        assert_eq!(source.send(executed_log(5, true)), 1);
        // different proposal id: filtered out by the source
        assert_eq!(source.send(executed_log(6, true)), 0);

        let event = sub.next().await.unwrap();
        assert_eq!(event.proposal_id(), Some(U256::from(5)));
    }

    #[tokio::test]
    async fn test_drop_releases_listener_and_stops_frames() {
        let source = Arc::new(ChannelLogSource::new());
        let watcher = watcher(source.clone());
        let filter = watcher.filter(GovernanceEventKind::ProposalExecuted, U256::from(5));

        let sub = watcher
            .subscribe(GovernanceEventKind::ProposalExecuted, U256::from(5))
            .await
            .unwrap();
        assert_eq!(watcher.registry().count(&filter), 1);

        drop(sub);

        assert_eq!(watcher.registry().count(&filter), 0);
        assert_eq!(watcher.registry().total(), 0);
        assert_eq!(source.send(executed_log(5, true)), 0);
        assert_eq!(source.open_channels(), 0);
    }

    #[tokio::test]
    async fn test_counts_are_per_filter() {
        let source = Arc::new(ChannelLogSource::new());
        let watcher = watcher(source);
        let a = watcher
            .subscribe(GovernanceEventKind::ProposalExecuted, U256::from(1))
            .await
            .unwrap();
        let b = watcher
            .subscribe(GovernanceEventKind::ProposalExecuted, U256::from(1))
            .await
            .unwrap();
        let c = watcher
            .subscribe(GovernanceEventKind::ProposalRejected, U256::from(1))
            .await
            .unwrap();

        let executed = watcher.filter(GovernanceEventKind::ProposalExecuted, U256::from(1));
        assert_eq!(watcher.registry().count(&executed), 2);
        assert_eq!(watcher.registry().total(), 3);

        drop(a);
        assert_eq!(watcher.registry().count(&executed), 1);
        drop((b, c));
        assert_eq!(watcher.registry().total(), 0);
    }

    #[test]
    fn test_filter_matches() {
        let filter = LogFilter {
            address: Address::repeat_byte(0x02),
            event: GovernanceEventKind::ProposalExecuted.signature_hash(),
            topic1: Some(uint_topic(U256::from(5))),
        };
        assert!(filter.matches(&executed_log(5, false)));
        assert!(!filter.matches(&executed_log(4, false)));
        assert!(!filter.matches(&proposal_created_log(5, 1)));
    }
}
