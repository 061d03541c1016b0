use inkpost::api::ApiClient;
use inkpost::remote::{Credentials, Environment};
use inkpost::NoteStore;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials {
        client_key: "key".into(),
        client_secret: "secret".into(),
        developer_token: "dev_token".into(),
        environment: Environment::Sandbox,
    }
}

#[tokio::test]
async fn test_authenticate_then_get_sync_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/authenticate"))
        .and(header("Authorization", "Bearer dev_token"))
        .and(body_partial_json(serde_json::json!({"consumer_key": "key"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"session_token": "session"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/get-sync-state"))
        .and(header("Authorization", "Bearer session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "update_count": 42,
            "current_time": 1700000000000i64
        })))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();

    // Run blocking client in a blocking context
    let result = tokio::task::spawn_blocking(move || {
        let client = ApiClient::authenticate(&credentials(), Some(uri))?.disable_throttle();
        client.get_sync_state()
    })
    .await
    .unwrap();

    let state = result.unwrap();
    assert_eq!(state.update_count, 42);
    assert!(state.complete);
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid token"))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        ApiClient::authenticate(&credentials(), Some(uri)).map(|_| ())
    })
    .await
    .unwrap();

    match result {
        Err(inkpost::Error::Auth(message)) => assert!(message.contains("Invalid token")),
        other => panic!("Expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/list-notebooks"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Maintenance"))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new("token".into(), Some(uri))
            .unwrap()
            .disable_throttle();
        client.list_notebooks()
    })
    .await
    .unwrap();

    if let Err(inkpost::Error::Api { status, endpoint, .. }) = result {
        assert_eq!(status, 503);
        assert_eq!(endpoint, "/v1/list-notebooks");
    } else {
        panic!("Expected API error");
    }
}

#[tokio::test]
async fn test_note_and_resource_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/find-notes-metadata"))
        .and(body_partial_json(serde_json::json!({
            "notebook_guid": "nb", "ascending": false, "offset": 0, "max_notes": 50
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "notes": [{"guid": "n1", "update_sequence_num": 3, "title": "Hello"}]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/get-note"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "guid": "n1",
            "title": "Hello",
            "content": "<en-note><div>hi</div></en-note>",
            "update_sequence_num": 3,
            "resources": [{"guid": "r1", "content_hash": "beef", "update_sequence_num": 1}]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/get-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content_hash": "beef",
            "file_name": "photo.png"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/get-resource-data"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (notes, note, resource) = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new("token".into(), Some(uri))
            .unwrap()
            .disable_throttle();
        (
            client.find_note_metadata("nb", false, 0, 50).unwrap(),
            client.get_note("n1").unwrap(),
            client.get_resource_binary("r1").unwrap(),
        )
    })
    .await
    .unwrap();

    assert_eq!(notes[0].update_sequence_num, 3);
    assert_eq!(note.resources[0].content_hash, vec![0xbe, 0xef]);
    assert_eq!(resource.file_name, "photo.png");
    assert_eq!(resource.data, vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/get-resource"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new("token".into(), Some(uri))
            .unwrap()
            .disable_throttle();
        client.get_resource_binary("r404")
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(inkpost::Error::ResourceNotFound(ref guid)) if guid == "r404"));
}
