//! End-to-end tests: `LicenseClient` against a server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use keysmith::client::LicenseClient;
use keysmith::config::DatabaseConfig;
use keysmith::errors::LicenseError;
use keysmith::server::auth::ApiKeyAuthenticator;
use keysmith::server::database::Database;
use keysmith::server::handlers::AppState;
use keysmith::server::routes::build_router;

const ADMIN_KEY: &str = "client-test-admin-key";

/// Spin up a temporary keysmith server on a random port using in-memory SQLite.
async fn spawn_test_server() -> String {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let db = Database::connect(&config).await.expect("db connect failed");
    db.migrate().await.expect("migrate failed");

    let auth = Arc::new(ApiKeyAuthenticator::new(ADMIN_KEY).unwrap());
    let router = build_router(AppState::new(db, auth));

    // Bind to an ephemeral port
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("server failed");
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn client_runs_the_full_flow() {
    let base_url = spawn_test_server().await;
    let client = LicenseClient::new(&base_url)
        .unwrap()
        .with_admin_key(ADMIN_KEY);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.database, "connected");

    let issued = client.create_key("scriptA").await.unwrap();
    assert!(issued.success);
    assert_eq!(issued.script_id, "scriptA");

    let before = client.validate(42, "scriptA").await.unwrap();
    assert!(!before.valid);
    assert!(before.license.is_none());

    let activated = client.activate(&issued.key, 42).await.unwrap();
    assert_eq!(activated.message, "Activated!");
    assert_eq!(activated.script_id, "scriptA");

    let after = client.validate(42, "scriptA").await.unwrap();
    assert!(after.valid);
    let license = after.license.unwrap();
    assert_eq!(license.key, issued.key);
    assert_eq!(license.user_id, Some(42));
    assert_eq!(license.activation_date.as_deref(), Some(activated.activation_date.as_str()));
}

#[tokio::test]
async fn client_surfaces_server_rejections() {
    let base_url = spawn_test_server().await;

    let anonymous = LicenseClient::new(&base_url).unwrap();
    match anonymous.create_key("scriptA").await {
        Err(LicenseError::Rejected {
            status, message, ..
        }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("expected 401 rejection, got {other:?}"),
    }

    let err = anonymous
        .activate("AAAA-BBBB-CCCC-DDDD", 1)
        .await
        .unwrap_err();
    assert_eq!(err.rejection_code(), Some("LICENSE_NOT_FOUND"));

    let admin = anonymous.clone().with_admin_key(ADMIN_KEY);
    let issued = admin.create_key("scriptA").await.unwrap();
    admin.activate(&issued.key, 1).await.unwrap();

    let err = admin.activate(&issued.key, 2).await.unwrap_err();
    match &err {
        LicenseError::Rejected { status, message, .. } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Already activated");
        }
        other => panic!("expected 400 rejection, got {other:?}"),
    }
    assert_eq!(err.rejection_code(), Some("ALREADY_ACTIVATED"));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LicenseClient::new(format!("http://{addr}")).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, LicenseError::NetworkError(_)), "{err:?}");
}
