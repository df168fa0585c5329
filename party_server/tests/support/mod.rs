// Shared primitives for one-time server bootstrapping across integration tests.
use party_server::domain::CircuitConfig;
use party_server::domain::ports::PartyRecord;
use party_server::domain::tuning::{CarTuning, TrackTuning};
use party_server::interface_adapters::clients::MemoryRegistry;
use party_server::use_cases::SimulationSettings;
use party_server::{Registries, ServerOptions};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use uuid::Uuid;

pub const PARTY_ID: Uuid = Uuid::from_u128(0x0b7e_2a4e_0000_4000_8000_0000_0000_0001);
pub const OWNER_ID: Uuid = Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_0000_0000_0001);
// Registered players tests may join with; one per test keeps them independent.
pub const GUESTS: [Uuid; 4] = [
    Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_0000_0000_0002),
    Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_0000_0000_0003),
    Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_0000_0000_0004),
    Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_0000_0000_0005),
];

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

fn options() -> ServerOptions {
    let mut registry = MemoryRegistry::new()
        .with_player(OWNER_ID, "owner")
        .with_party(PartyRecord {
            uuid: PARTY_ID,
            owner_id: OWNER_ID,
            name: "integration cup".to_string(),
            circuit: CircuitConfig {
                seed: 1,
                min_point: 50,
                max_point: 100,
                x_size: 4000.0,
                y_size: 4000.0,
            },
        });
    for (i, guest) in GUESTS.iter().enumerate() {
        registry = registry.with_player(*guest, format!("guest-{i}"));
    }

    ServerOptions {
        party_id: PARTY_ID,
        registries: Registries::memory(registry),
        settings: SimulationSettings {
            tick_interval: Duration::from_secs_f64(1.0 / 120.0),
            end_grace: Duration::from_millis(100),
            command_capacity: 1024,
            car: CarTuning::default(),
            track: TrackTuning::default(),
        },
    }
}

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                party_server::serve_party(listener, options())
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

pub fn bus_url() -> String {
    let base = ensure_server();
    format!("ws://{}/bus", base.trim_start_matches("http://"))
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    // Party bootstrap (track generation, listeners) runs before the bind is served.
    for _ in 0..250 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
