// Framework bootstrap for the party server runtime.

use crate::domain::ports::{MessageBus, PartyRegistry, PlayerRegistry};
use crate::domain::track::generate_track;
use crate::domain::tuning::{CarTuning, TrackTuning};
use crate::domain::{Party, Player};
use crate::frameworks::config;
use crate::interface_adapters::bus::TopicExchange;
use crate::interface_adapters::clients::{HttpRegistry, MemoryRegistry};
use crate::interface_adapters::http::health;
use crate::interface_adapters::listeners::{ListenerContext, start_listeners};
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::protocol::PartyDto;
use crate::interface_adapters::publisher::BusSyncPublisher;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::topics::creation_topic;
use crate::use_cases::{PartySnapshot, SimulationSettings, prepare_party};

use axum::{Router, routing::get};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use uuid::Uuid;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Where player and party records come from.
#[derive(Clone)]
pub struct Registries {
    pub players: Arc<dyn PlayerRegistry>,
    pub parties: Arc<dyn PartyRegistry>,
}

impl Registries {
    pub fn memory(registry: MemoryRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            players: registry.clone(),
            parties: registry,
        }
    }
}

/// Everything needed to host one party.
pub struct ServerOptions {
    pub party_id: Uuid,
    pub registries: Registries,
    pub settings: SimulationSettings,
}

/// Serves the party named by the environment until it reaches END.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let options = options_from_env()?;
    serve_party(listener, options).await
}

/// Boots the party, its listeners and the bridge, then serves until the
/// party task finishes.
pub async fn serve_party(listener: tokio::net::TcpListener, options: ServerOptions) -> Result<()> {
    let address = listener.local_addr()?;
    let bus = Arc::new(TopicExchange::new(config::SUBSCRIPTION_QUEUE_CAPACITY));

    let party = load_party(options.party_id, &options.registries, &options.settings.track).await?;
    let party_id = party.uuid;
    let owner_id = party.owner_id;

    // Hand the freshly generated party to its owner.
    let creation = serde_json::to_string(&PartyDto::from(&PartySnapshot::from(&party)))
        .map_err(|e| std::io::Error::other(format!("failed to serialize party: {e}")))?;
    bus.publish(&creation_topic(owner_id), Arc::from(creation))
        .map_err(|e| std::io::Error::other(format!("failed to publish party: {e}")))?;

    let publisher = Arc::new(BusSyncPublisher::new(bus.clone(), party_id));
    let (handle, pending) = prepare_party(party, options.settings, publisher);

    // The simulation only starts once every listener is ready.
    start_listeners(ListenerContext::new(
        bus.clone(),
        handle,
        options.registries.players.clone(),
    ))
    .await
    .map_err(|e| std::io::Error::other(format!("failed to start listeners: {e}")))?;
    let party_task = pending.start();

    let state = Arc::new(AppState { bus: bus.clone() });
    let app = Router::new()
        .route("/bus", get(ws_handler))
        .route("/health", get(health))
        .with_state(state);

    tracing::info!(%address, %party_id, "listening");

    tokio::select! {
        // Serve app and report errors rather than panicking
        served = axum::serve(listener, app).into_future() => {
            served.inspect_err(|e| {
                tracing::error!(error = %e, "server error");
            })
        }
        finished = party_task => {
            bus.close();
            match finished {
                Ok(Ok(())) => {
                    tracing::info!(%party_id, "party finished; shutting down");
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "party stopped");
                    Err(std::io::Error::other(format!("party stopped: {e}")))
                }
                Err(e) => {
                    tracing::error!(error = %e, "party task failed");
                    Err(std::io::Error::other(format!("party task failed: {e}")))
                }
            }
        }
    }
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn options_from_env() -> Result<ServerOptions> {
    let party_id = config::party_id().ok_or_else(|| {
        std::io::Error::other("missing party id: set PARTY_ID or pass it as the first argument")
    })?;

    Ok(ServerOptions {
        party_id,
        registries: registries_from_env()?,
        settings: SimulationSettings {
            tick_interval: config::tick_interval(),
            end_grace: config::end_grace(),
            command_capacity: config::COMMAND_CHANNEL_CAPACITY,
            car: CarTuning::default(),
            track: TrackTuning::default(),
        },
    })
}

fn registries_from_env() -> Result<Registries> {
    if let Some(path) = config::registry_file() {
        let registry = MemoryRegistry::load(&path)
            .map_err(|e| std::io::Error::other(format!("failed to load registry file: {e}")))?;
        tracing::debug!(path = %path.display(), "registry loaded from file");
        return Ok(Registries::memory(registry));
    }

    let registry_url = config::registry_url();
    let registry_timeout = config::registry_timeout();
    let registry = Arc::new(
        HttpRegistry::new(registry_url.clone(), registry_timeout).map_err(|e| {
            std::io::Error::other(format!("failed to initialize registry client: {e}"))
        })?,
    );
    tracing::debug!(
        registry_url = %registry_url,
        registry_timeout_ms = registry_timeout.as_millis(),
        "registry client configured"
    );
    Ok(Registries {
        players: registry.clone(),
        parties: registry,
    })
}

async fn load_party(
    party_id: Uuid,
    registries: &Registries,
    tuning: &TrackTuning,
) -> Result<Party> {
    let record = registries
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to load party {party_id}: {e}")))?;

    let track = generate_track(&record.circuit, tuning, &mut rand::thread_rng())
        .map_err(|e| std::io::Error::other(format!("failed to generate track: {e}")))?;
    tracing::info!(%party_id, track_points = track.len(), "track generated");

    let owner = registries
        .players
        .get_player(record.owner_id)
        .await
        .map_err(|e| {
            std::io::Error::other(format!("failed to load owner {}: {e}", record.owner_id))
        })?;

    let mut party = Party::new(record.uuid, record.name, record.owner_id, record.circuit, track);
    if let Err(e) = party.add_player(Player::new(owner.uuid, owner.name)) {
        tracing::warn!(error = %e, "failed to seat party owner");
    }
    Ok(party)
}
