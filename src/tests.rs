//! Integration tests for the Trash Tracker backend.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::RwLock;

use crate::catalog::SiteCatalog;
use crate::config::{Config, Environment};
use crate::db::{init_database, Repository};
use crate::eligibility::EligibilityGate;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config; non-production keeps the event-window gate open
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            environment: Environment::Development,
        };

        let state = AppState {
            repo,
            catalog: Arc::new(RwLock::new(Arc::new(SiteCatalog::default()))),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gate: Arc::new(EligibilityGate::new(config.environment)),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Import the standard test reference set: town-a allows roadside with no
    /// sites, town-b allows roadside with three sites, town-c is site-only.
    async fn import_reference(&self) -> Value {
        let resp = self
            .client
            .put(self.url("/api/reference"))
            .json(&json!({
                "towns": [
                    {
                        "townId": "town-a",
                        "name": "Montpelier",
                        "allowsRoadside": true,
                        "bounds": { "west": -72.62, "south": 44.24, "east": -72.54, "north": 44.32 }
                    },
                    {
                        "townId": "town-b",
                        "name": "Barre",
                        "allowsRoadside": true,
                        "bounds": { "west": -72.52, "south": 44.17, "east": -72.47, "north": 44.22 }
                    },
                    {
                        "townId": "town-c",
                        "name": "Randolph",
                        "allowsRoadside": false,
                        "bounds": { "west": -72.72, "south": 43.95, "east": -72.64, "north": 44.02 }
                    }
                ],
                "sites": [
                    { "id": "site-1", "townId": "town-b", "name": "North Depot" },
                    { "id": "site-2", "townId": "town-b", "name": "Fairground Lot" },
                    { "id": "site-3", "townId": "town-b", "name": "Transfer Station" }
                ]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    /// Open a session for a user with the given teams, located at the given
    /// point. Returns the session id and the initial state.
    async fn open_session(&self, teams: Value, latitude: f64, longitude: f64) -> (String, Value) {
        let resp = self
            .client
            .post(self.url("/api/sessions"))
            .json(&json!({
                "user": {
                    "userId": "user-1",
                    "email": "volunteer@example.com",
                    "teams": teams
                },
                "location": {
                    "coordinates": { "latitude": latitude, "longitude": longitude }
                }
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();
        (session_id, body["data"]["state"].clone())
    }

    async fn post_event(&self, session_id: &str, event: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/sessions/{}/events", session_id)))
            .json(&event)
            .send()
            .await
            .unwrap()
    }

    async fn state_after_event(&self, session_id: &str, event: Value) -> Value {
        let resp = self.post_event(session_id, event).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["state"].clone()
    }
}

const IN_TOWN_A: (f64, f64) = (44.26, -72.58);
const IN_TOWN_B: (f64, f64) = (44.19, -72.50);
const IN_TOWN_C: (f64, f64) = (43.99, -72.68);

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::with_psk(Some("secret-key".to_string())).await;

    // Request without API key
    let client = Client::new();
    let resp = client
        .get(fixture.url("/api/reference"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::with_psk(Some("correct-key".to_string())).await;

    let client = Client::new();
    let resp = client
        .get(fixture.url("/api/reference"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_valid_psk() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/reference"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_reference_import_and_listing() {
    let fixture = TestFixture::new().await;

    let body = fixture.import_reference().await;
    assert_eq!(body["data"]["towns"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["sites"].as_array().unwrap().len(), 3);
    assert!(body["revisionId"].as_i64().unwrap() > 0);

    // Lists preserve the configured order
    let towns_resp = fixture
        .client
        .get(fixture.url("/api/towns"))
        .send()
        .await
        .unwrap();
    let towns_body: Value = towns_resp.json().await.unwrap();
    let towns = towns_body["data"].as_array().unwrap();
    assert_eq!(towns[0]["townId"], "town-a");
    assert_eq!(towns[2]["allowsRoadside"], false);

    let sites_resp = fixture
        .client
        .get(fixture.url("/api/sites"))
        .send()
        .await
        .unwrap();
    let sites_body: Value = sites_resp.json().await.unwrap();
    let sites = sites_body["data"].as_array().unwrap();
    assert_eq!(sites[1]["id"], "site-2");

    // Per-town site listing
    let town_sites_resp = fixture
        .client
        .get(fixture.url("/api/towns/town-b/sites"))
        .send()
        .await
        .unwrap();
    let town_sites_body: Value = town_sites_resp.json().await.unwrap();
    assert_eq!(town_sites_body["data"].as_array().unwrap().len(), 3);

    let empty_resp = fixture
        .client
        .get(fixture.url("/api/towns/town-a/sites"))
        .send()
        .await
        .unwrap();
    let empty_body: Value = empty_resp.json().await.unwrap();
    assert!(empty_body["data"].as_array().unwrap().is_empty());

    let missing_resp = fixture
        .client
        .get(fixture.url("/api/towns/ghost-town/sites"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_resp.status(), 404);
}

#[tokio::test]
async fn test_reference_import_rejects_orphan_site() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url("/api/reference"))
        .json(&json!({
            "towns": [],
            "sites": [{ "id": "site-1", "townId": "ghost-town", "name": "Nowhere" }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_session_locating_before_first_fix() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/sessions"))
        .json(&json!({
            "user": { "userId": "user-1", "email": "volunteer@example.com" }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["state"]["phase"], "locating");
}

#[tokio::test]
async fn test_session_roadside_only_flow() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let teams = json!({ "team-1": { "name": "Roadside Rangers" } });
    let (session_id, state) = fixture
        .open_session(teams, IN_TOWN_A.0, IN_TOWN_A.1)
        .await;

    // Town A: roadside allowed, no sites, single team shown as a label
    assert_eq!(state["phase"], "composing");
    assert_eq!(state["town"]["townId"], "town-a");
    assert_eq!(state["affordance"], "roadsideOnly");
    assert_eq!(state["teamSelector"]["kind"], "label");
    assert_eq!(state["teamSelector"]["team"]["name"], "Roadside Rangers");

    fixture
        .state_after_event(&session_id, json!({ "type": "tagToggled", "tag": "tires" }))
        .await;
    fixture
        .state_after_event(
            &session_id,
            json!({ "type": "bagCountEntered", "value": "3" }),
        )
        .await;
    let state = fixture
        .state_after_event(&session_id, json!({ "type": "dropHere" }))
        .await;
    assert_eq!(state["routing"]["kind"], "roadsidePin");
    assert_eq!(state["map"]["pin"]["latitude"], IN_TOWN_A.0);

    // Submit persists the drop and resets the draft
    let submit_resp = fixture
        .client
        .post(fixture.url(&format!("/api/sessions/{}/submit", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(submit_resp.status(), 200);
    let submit_body: Value = submit_resp.json().await.unwrap();
    let drop = &submit_body["data"]["drop"];
    assert!(drop["id"].is_string());
    assert_eq!(drop["active"], true);
    assert_eq!(drop["wasCollected"], false);
    assert_eq!(drop["bagCount"], 3);
    assert_eq!(drop["tags"], json!(["tires"]));
    assert_eq!(drop["teamId"], "team-1");
    assert_eq!(drop["location"]["latitude"], IN_TOWN_A.0);
    assert_eq!(drop["coordinates"]["latitude"], IN_TOWN_A.0);
    assert!(drop["collectionSiteId"].is_null());

    let reset_state = &submit_body["data"]["state"];
    assert_eq!(reset_state["phase"], "composing");
    assert_eq!(reset_state["bagCount"], 1);
    assert_eq!(reset_state["tags"], json!([]));
    assert!(reset_state["routing"].is_null());

    // The saved drop is listed as active
    let drops_resp = fixture
        .client
        .get(fixture.url("/api/drops?active=true"))
        .send()
        .await
        .unwrap();
    let drops_body: Value = drops_resp.json().await.unwrap();
    assert_eq!(drops_body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_session_site_selection_flow() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let teams = json!({
        "team-1": { "name": "Rangers" },
        "team-2": { "name": "Sweepers" }
    });
    let (session_id, state) = fixture
        .open_session(teams, IN_TOWN_B.0, IN_TOWN_B.1)
        .await;

    // Town B: both affordances, two teams shown as a picker
    assert_eq!(state["affordance"], "roadsideAndSiteChoice");
    assert_eq!(state["teamSelector"]["kind"], "picker");
    assert_eq!(
        state["teamSelector"]["options"].as_array().unwrap().len(),
        2
    );

    let state = fixture
        .state_after_event(&session_id, json!({ "type": "sitePickerOpened" }))
        .await;
    assert_eq!(state["phase"], "siteSelection");
    assert_eq!(state["sites"].as_array().unwrap().len(), 3);

    let state = fixture
        .state_after_event(
            &session_id,
            json!({ "type": "siteChosen", "siteId": "site-2" }),
        )
        .await;
    assert_eq!(state["phase"], "composing");
    assert_eq!(state["selectedSite"]["id"], "site-2");
    assert!(state["affordance"].is_null());
    assert!(state["map"].is_null());

    let submit_resp = fixture
        .client
        .post(fixture.url(&format!("/api/sessions/{}/submit", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(submit_resp.status(), 200);
    let submit_body: Value = submit_resp.json().await.unwrap();
    let drop = &submit_body["data"]["drop"];
    assert_eq!(drop["collectionSiteId"], "site-2");
    assert!(drop["location"].is_null());
}

#[tokio::test]
async fn test_site_only_town_rejects_roadside_events() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (session_id, state) = fixture
        .open_session(json!({}), IN_TOWN_C.0, IN_TOWN_C.1)
        .await;
    assert_eq!(state["affordance"], "siteOnly");
    assert_eq!(state["teamSelector"]["kind"], "hidden");

    let resp = fixture
        .post_event(&session_id, json!({ "type": "dropHere" }))
        .await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_EDITABLE");
}

#[tokio::test]
async fn test_location_error_disables_composing() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (session_id, _) = fixture
        .open_session(json!({}), IN_TOWN_B.0, IN_TOWN_B.1)
        .await;

    let state = fixture
        .state_after_event(
            &session_id,
            json!({
                "type": "locationChanged",
                "fix": { "error": "Location services are off" }
            }),
        )
        .await;
    assert_eq!(state["phase"], "locationDisabled");
    assert_eq!(state["error"], "Location services are off");
}

#[tokio::test]
async fn test_unresolvable_location_shows_town_unresolved() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (_, state) = fixture.open_session(json!({}), 43.0, -73.5).await;
    assert_eq!(state["phase"], "townUnresolved");
}

#[tokio::test]
async fn test_submit_without_routing_is_rejected() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (session_id, _) = fixture
        .open_session(json!({}), IN_TOWN_B.0, IN_TOWN_B.1)
        .await;

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/sessions/{}/submit", session_id)))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_drop_update_and_delete() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (session_id, _) = fixture
        .open_session(json!({}), IN_TOWN_A.0, IN_TOWN_A.1)
        .await;
    fixture
        .state_after_event(&session_id, json!({ "type": "dropHere" }))
        .await;
    let submit_resp = fixture
        .client
        .post(fixture.url(&format!("/api/sessions/{}/submit", session_id)))
        .send()
        .await
        .unwrap();
    let submit_body: Value = submit_resp.json().await.unwrap();
    let drop_id = submit_body["data"]["drop"]["id"].as_str().unwrap();

    // Mark the drop collected
    let update_resp = fixture
        .client
        .put(fixture.url(&format!("/api/drops/{}", drop_id)))
        .json(&json!({ "wasCollected": true, "active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_resp.status(), 200);
    let update_body: Value = update_resp.json().await.unwrap();
    assert_eq!(update_body["data"]["wasCollected"], true);

    // It no longer shows up as active
    let active_resp = fixture
        .client
        .get(fixture.url("/api/drops?active=true"))
        .send()
        .await
        .unwrap();
    let active_body: Value = active_resp.json().await.unwrap();
    assert!(active_body["data"].as_array().unwrap().is_empty());

    // Invalid bag count is rejected
    let bad_resp = fixture
        .client
        .put(fixture.url(&format!("/api/drops/{}", drop_id)))
        .json(&json!({ "bagCount": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_resp.status(), 400);

    // Delete and verify
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/drops/{}", drop_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/drops/{}", drop_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 404);
}

#[tokio::test]
async fn test_unknown_session_not_found() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url(&format!(
            "/api/sessions/{}",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_session_close_discards_draft() {
    let fixture = TestFixture::new().await;
    fixture.import_reference().await;

    let (session_id, _) = fixture
        .open_session(json!({}), IN_TOWN_A.0, IN_TOWN_A.1)
        .await;

    let close_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/sessions/{}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(close_resp.status(), 200);

    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/sessions/{}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 404);
}

#[tokio::test]
async fn test_revision_increments_on_writes() {
    let fixture = TestFixture::new().await;

    let initial_resp = fixture
        .client
        .get(fixture.url("/api/reference/revision"))
        .send()
        .await
        .unwrap();
    let initial_body: Value = initial_resp.json().await.unwrap();
    let initial_revision = initial_body["data"]["revisionId"].as_i64().unwrap();

    // Reference import bumps the revision once
    let import_body = fixture.import_reference().await;
    let after_import = import_body["revisionId"].as_i64().unwrap();
    assert_eq!(after_import, initial_revision + 1);

    // A submitted drop bumps it again
    let (session_id, _) = fixture
        .open_session(json!({}), IN_TOWN_A.0, IN_TOWN_A.1)
        .await;
    fixture
        .state_after_event(&session_id, json!({ "type": "dropHere" }))
        .await;
    let submit_resp = fixture
        .client
        .post(fixture.url(&format!("/api/sessions/{}/submit", session_id)))
        .send()
        .await
        .unwrap();
    let submit_body: Value = submit_resp.json().await.unwrap();
    assert_eq!(
        submit_body["revisionId"].as_i64().unwrap(),
        initial_revision + 2
    );
}
