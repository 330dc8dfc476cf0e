//! # Presence Server
//!
//! Owns every component of the engine and the two background tasks that
//! keep it in step with the PBX:
//!
//! - the **event pump**, which normalizes raw PBX events and feeds them to
//!   the reconciler. Events without a sequence apply to the current state;
//!   a sequenced event behind the store is rejected with `StaleWrite` and
//!   left for the PBX to re-read and resend.
//! - the **heartbeat sweep**, which forces agents `OFFLINE` once the PBX has
//!   been silent about them for longer than the heartbeat timeout.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             PresenceServer              │
//! ├─────────────────────────────────────────┤
//! │  event pump  │  heartbeat sweep         │
//! ├─────────────────────────────────────────┤
//! │  CallControlOrchestrator                │
//! ├─────────────────────────────────────────┤
//! │  PresenceReconciler → PresencePublisher │
//! ├─────────────────────────────────────────┤
//! │  PresenceStore │ ChannelRegistry        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Liveness tracking for an agent starts with the first PBX event that
//! names it and stops when it goes `OFFLINE`.
//!
//! ```rust
//! use presence_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let pbx = Arc::new(InMemoryTelephony::new());
//! let mut server = PresenceServerBuilder::new()
//!     .with_config(PresenceConfig::default())
//!     .with_telephony(pbx.clone())
//!     .build()?;
//!
//! let mut updates = server.subscribe().expect("default publisher is a broadcast");
//! if let Some(events) = pbx.take_event_stream() {
//!     server.start(events)?;
//! }
//!
//! server.enroll(&ActorId::system(), AgentId::from("agent-001"), &["whatsapp".into()])?;
//! server.orchestrator().login(&AgentId::from("agent-001"), "inbound", &[], 0, &ActorId::system()).await?;
//! assert_eq!(updates.recv().await.unwrap().state.sequence, 1);
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::agent::{ActorId, Agent, AgentId, HeartbeatMonitor};
use crate::channel::{ChannelId, ChannelRegistry};
use crate::config::PresenceConfig;
use crate::error::{PresenceError, Result};
use crate::notify::{BroadcastPublisher, PresenceEvent, PresencePublisher};
use crate::orchestrator::CallControlOrchestrator;
use crate::presence::state::{PresenceState, PresenceStatus};
use crate::presence::store::PresenceStore;
use crate::reconciler::{Applied, PresenceReconciler};
use crate::telephony::{normalize, InMemoryTelephony, TelephonyAdapter, TelephonyEvent, TelephonyEventKind};

/// Shared by the server and its background tasks
struct EventRouter {
    reconciler: Arc<PresenceReconciler>,
    heartbeat: Arc<HeartbeatMonitor>,
    default_channel: ChannelId,
}

impl EventRouter {
    async fn route_raw(&self, raw: &Value) -> Result<Option<Applied>> {
        match normalize(raw, &self.default_channel) {
            Some(event) => self.route(event).await,
            None => Ok(None),
        }
    }

    async fn route(&self, event: TelephonyEvent) -> Result<Option<Applied>> {
        if event.kind == TelephonyEventKind::HeartbeatLost {
            self.heartbeat.forget(&event.agent_id);
        } else {
            self.heartbeat.record(&event.agent_id);
        }

        let result = self.reconciler.handle_telephony_event(&event).await;
        if let Err(e @ PresenceError::StaleWrite { .. }) = &result {
            debug!(
                "PBX event {} for {} carried a stale sequence: {}",
                event.kind.name(),
                event.agent_id,
                e
            );
        }

        if let Ok(Some(applied)) = &result {
            if applied.state().status == PresenceStatus::Offline {
                self.heartbeat.forget(&event.agent_id);
            }
        }
        result
    }

    async fn sweep(&self, now: Instant) -> Vec<AgentId> {
        let expired = self.heartbeat.expired(now);
        for agent_id in &expired {
            if let Err(e) = self.reconciler.force_offline(agent_id, &ActorId::system()).await {
                warn!("Heartbeat sweep could not force {} offline: {}", agent_id, e);
            }
        }
        expired
    }
}

/// The presence engine with its background tasks
pub struct PresenceServer {
    config: PresenceConfig,
    router: Arc<EventRouter>,
    orchestrator: Arc<CallControlOrchestrator>,
    broadcast: Option<Arc<BroadcastPublisher>>,
    pump_handle: Option<JoinHandle<()>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl PresenceServer {
    pub fn new(
        config: PresenceConfig,
        telephony: Arc<dyn TelephonyAdapter>,
        publisher: Option<Arc<dyn PresencePublisher>>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ChannelRegistry::from_config(&config)?);

        let (publisher, broadcast) = match publisher {
            Some(publisher) => (publisher, None),
            None => {
                let broadcast = Arc::new(BroadcastPublisher::new(config.general.fanout_capacity));
                let shared: Arc<dyn PresencePublisher> = broadcast.clone();
                (shared, Some(broadcast))
            }
        };

        let reconciler = Arc::new(PresenceReconciler::new(
            Arc::new(PresenceStore::new()),
            registry,
            publisher,
        ));
        let orchestrator = Arc::new(CallControlOrchestrator::new(
            reconciler.clone(),
            telephony,
            config.remote_timeout(),
        ));
        let router = Arc::new(EventRouter {
            reconciler,
            heartbeat: Arc::new(HeartbeatMonitor::new(config.heartbeat_timeout())),
            default_channel: ChannelId(config.general.default_voice_channel.clone()),
        });

        info!(
            "🚀 Presence engine ready: remote timeout {:?}, heartbeat timeout {:?}",
            config.remote_timeout(),
            config.heartbeat_timeout()
        );

        Ok(Self {
            config,
            router,
            orchestrator,
            broadcast,
            pump_handle: None,
            sweep_handle: None,
        })
    }

    /// Start the event pump on `events` and the heartbeat sweep
    pub fn start(&mut self, mut events: mpsc::UnboundedReceiver<Value>) -> Result<()> {
        if self.pump_handle.is_some() {
            return Err(PresenceError::internal("presence server already started"));
        }

        let router = self.router.clone();
        self.pump_handle = Some(tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                match router.route_raw(&raw).await {
                    Ok(Some(Applied::Moved(state))) => debug!("PBX event committed at seq {}", state.sequence),
                    Ok(_) => {}
                    Err(e) => warn!("⚠️ PBX event {} not applied: {}", raw, e),
                }
            }
            info!("PBX event stream closed");
        }));
        info!("✅ Started telephony event pump");

        let router = self.router.clone();
        let period = self.config.heartbeat_sweep_interval();
        self.sweep_handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let expired = router.sweep(Instant::now()).await;
                if !expired.is_empty() {
                    info!("💔 Heartbeat sweep forced {} agent(s) offline", expired.len());
                }
            }
        }));
        info!("✅ Started heartbeat sweep every {:?}", period);

        Ok(())
    }

    /// Stop both background tasks
    pub async fn stop(&mut self) {
        info!("🛑 Stopping presence server...");
        for handle in [self.pump_handle.take(), self.sweep_handle.take()].into_iter().flatten() {
            handle.abort();
            let _ = handle.await;
        }
        info!("✅ Presence server stopped");
    }

    /// Apply one raw PBX event inline, bypassing the pump
    pub async fn ingest(&self, raw: &Value) -> Result<Option<Applied>> {
        self.router.route_raw(raw).await
    }

    /// Run one heartbeat sweep as of `now`
    pub async fn sweep_heartbeats(&self, now: Instant) -> Vec<AgentId> {
        self.router.sweep(now).await
    }

    pub fn enroll(&self, actor: &ActorId, agent_id: AgentId, channels: &[ChannelId]) -> Result<Arc<Agent>> {
        self.router.reconciler.enroll(actor, agent_id, channels)
    }

    pub async fn disable(&self, agent_id: &AgentId, actor: &ActorId) -> Result<PresenceState> {
        let state = self.router.reconciler.disable(agent_id, actor).await?;
        self.router.heartbeat.forget(agent_id);
        Ok(state)
    }

    pub fn presence(&self, agent_id: &AgentId) -> Result<PresenceState> {
        self.router.reconciler.store().get(agent_id)
    }

    pub fn snapshot(&self, agent_id: &AgentId) -> Result<Arc<Agent>> {
        self.router.reconciler.store().snapshot(agent_id)
    }

    /// Agents a channel may route a new contact to
    pub fn eligible_agents(&self, channel: &ChannelId) -> Result<Vec<AgentId>> {
        self.router.reconciler.registry().category_of(channel)?;
        Ok(self.router.reconciler.store().eligible_for(channel))
    }

    /// Live updates, when the default broadcast publisher is in use
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PresenceEvent>> {
        self.broadcast.as_ref().map(|b| b.subscribe())
    }

    pub fn orchestrator(&self) -> &Arc<CallControlOrchestrator> {
        &self.orchestrator
    }

    pub fn reconciler(&self) -> &Arc<PresenceReconciler> {
        &self.router.reconciler
    }

    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.router.heartbeat
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }
}

impl Drop for PresenceServer {
    fn drop(&mut self) {
        for handle in [self.pump_handle.take(), self.sweep_handle.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

/// Builder for PresenceServer with fluent API
pub struct PresenceServerBuilder {
    config: Option<PresenceConfig>,
    telephony: Option<Arc<dyn TelephonyAdapter>>,
    publisher: Option<Arc<dyn PresencePublisher>>,
}

impl PresenceServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            telephony: None,
            publisher: None,
        }
    }

    pub fn with_config(mut self, config: PresenceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// PBX connector; defaults to [`InMemoryTelephony`]
    pub fn with_telephony(mut self, telephony: Arc<dyn TelephonyAdapter>) -> Self {
        self.telephony = Some(telephony);
        self
    }

    /// Replace the default broadcast fan-out
    pub fn with_publisher(mut self, publisher: Arc<dyn PresencePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> Result<PresenceServer> {
        let telephony = self
            .telephony
            .unwrap_or_else(|| Arc::new(InMemoryTelephony::new()));
        PresenceServer::new(self.config.unwrap_or_default(), telephony, self.publisher)
    }
}

impl Default for PresenceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
