//! Drives a scripted shift against the in-memory PBX and prints every
//! presence transition the engine publishes.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use presence_engine::logging::{log_welcome, setup_logging, LoggingConfig};
use presence_engine::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "presence-sim", version, about = "Simulate agent presence against an in-memory PBX")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,

    /// Log span enter and exit events
    #[arg(long)]
    spans: bool,

    /// Number of agents in the simulated shift
    #[arg(short, long, default_value_t = 3)]
    agents: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PresenceConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PresenceConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    let mut logging = LoggingConfig::from_config(&config.logging, "presence-sim")?;
    if args.json {
        logging = logging.with_json();
    }
    if args.spans {
        logging = logging.with_spans();
    }
    setup_logging(logging)?;
    log_welcome("presence-sim", env!("CARGO_PKG_VERSION"));

    let pbx = Arc::new(InMemoryTelephony::new());
    let mut server = PresenceServerBuilder::new()
        .with_config(config)
        .with_telephony(pbx.clone())
        .build()?;

    let mut updates = server.subscribe().context("broadcast publisher not installed")?;
    let printer = tokio::spawn(async move {
        while let Ok(event) = updates.recv().await {
            println!(
                "{} seq={:>3} {:<22} code={}",
                event.agent_id,
                event.state.sequence,
                event.state.status.to_string(),
                event
                    .state
                    .interchange_code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    });

    let events = pbx.take_event_stream().context("PBX event stream already taken")?;
    server.start(events)?;

    let channels: Vec<ChannelId> = server
        .reconciler()
        .registry()
        .channels()
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    for n in 1..=args.agents {
        let agent = AgentId(format!("agent-{:03}", n));
        server.enroll(&ActorId::from("admin"), agent.clone(), &channels)?;
        run_shift(&server, &pbx, &agent).await?;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("📊 Final presence:");
    for agent in server.reconciler().store().agents() {
        let snapshot = server.snapshot(&agent)?;
        let available: Vec<&str> = snapshot
            .bindings
            .iter()
            .filter(|b| b.is_available())
            .map(|b| b.channel.as_ref())
            .collect();
        info!("  {} {} available on {:?}", agent, snapshot.status(), available);
    }

    server.stop().await;
    printer.abort();
    Ok(())
}

/// One agent's shift: login, a call that gets parked and disposed, a break
async fn run_shift(server: &PresenceServer, pbx: &InMemoryTelephony, agent: &AgentId) -> Result<()> {
    let actor = ActorId::from(agent);
    let orchestrator = server.orchestrator();

    let state = orchestrator.login(agent, "inbound", &["support".to_string()], 0, &actor).await?;
    let state = orchestrator.unpause(agent, state.sequence, &actor).await?;

    let call_id = CallId::new();
    pbx.emit(json!({"agentId": agent.0, "callId": call_id.0, "type": "assigned"}));
    pbx.emit(json!({"agentId": agent.0, "callId": call_id.0, "type": "answered", "contact": "citizen-42"}));
    let state = wait_for(server, agent, state.sequence + 2).await?;

    let state = orchestrator.park(agent, true, state.sequence, &actor).await?;
    let state = orchestrator.park(agent, false, state.sequence, &actor).await?;

    pbx.emit(json!({"agentId": agent.0, "callId": call_id.0, "type": "ended"}));
    let state = wait_for(server, agent, state.sequence + 1).await?;

    let state = orchestrator.dispose(agent, "SALE", Some("break"), state.sequence, &actor).await?;
    orchestrator.unpause(agent, state.sequence, &actor).await?;
    Ok(())
}

/// Poll until the pump committed up to `sequence`
async fn wait_for(server: &PresenceServer, agent: &AgentId, sequence: u64) -> Result<PresenceState> {
    for _ in 0..100 {
        let state = server.presence(agent)?;
        if state.sequence >= sequence {
            return Ok(state);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("agent {} never reached sequence {}", agent, sequence)
}
