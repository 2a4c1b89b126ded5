//! Service HTTP client against a wiremock server

mod common;

use common::{configuration, init_rustls};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use vault_services::config::Environment;
use vault_services::constants::SERVICE_ADDRESS_KEY;
use vault_services::http::{HttpOutcome, ResponseStatus, ServiceHttpClient, ServiceResponse};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    #[serde(flatten)]
    status: ResponseStatus,
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    total: i64,
}

impl ServiceResponse for OrderResponse {
    fn status(&self) -> &ResponseStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut ResponseStatus {
        &mut self.status
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrder {
    customer_id: String,
    items: Vec<String>,
}

// Base address ends in `/` so relative paths concatenate onto it
fn client_for(server: &MockServer, suffix: Option<&str>) -> ServiceHttpClient {
    init_rustls();
    let address = format!("{}/", server.uri());
    let config = configuration(Environment::Production, &[(SERVICE_ADDRESS_KEY, address.as_str())]);
    ServiceHttpClient::with_base_url(&config, suffix).unwrap()
}

#[tokio::test]
async fn test_get_parses_body_and_stamps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "orderId": "42", "total": 1999 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("orders/"));
    let outcome = client
        .get::<OrderResponse>("/42", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success());
    let order = outcome.into_inner();
    assert_eq!(order.order_id, "42");
    assert_eq!(order.total, 1999);
    assert_eq!(order.status_code(), 200);
    assert_eq!(order.status_message(), "OK");
}

#[tokio::test]
async fn test_absolute_path_ignores_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "orderId": "d" })))
        .expect(1)
        .mount(&server)
        .await;

    init_rustls();
    let config = configuration(Environment::Production, &[]);
    let client =
        ServiceHttpClient::with_base_url(&config, Some("https://unused.example.com/api")).unwrap();

    let url = format!("{}/direct", server.uri());
    let outcome = client
        .get::<OrderResponse>(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.into_inner().order_id, "d");
}

#[tokio::test]
async fn test_failure_status_is_soft_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "orderId": "ignored" })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("orders/"));
    let outcome = client
        .get::<OrderResponse>("missing", &CancellationToken::new())
        .await
        .unwrap();

    let HttpOutcome::Failed(order) = outcome else {
        panic!("expected a soft failure");
    };
    assert_eq!(order.status_code(), 500);
    assert_eq!(
        order.status_message(),
        format!(
            "HTTP status client error (404 Not Found) for url ({}/orders/missing)",
            server.uri()
        )
    );
    assert!(order.order_id.is_empty());
    assert_eq!(order.total, 0);
}

#[tokio::test]
async fn test_server_error_is_soft_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let request = CreateOrder {
        customer_id: "c-1".to_string(),
        items: vec![],
    };
    let outcome = client
        .post::<_, OrderResponse>(&request, "/orders", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.response().status_code(), 500);
    assert_eq!(
        outcome.response().status_message(),
        format!(
            "HTTP status server error (503 Service Unavailable) for url ({}/orders)",
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_suffix_without_trailing_slash_is_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "orderId": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("orders"));
    let outcome = client
        .get::<OrderResponse>("/42", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.into_inner().order_id, "42");
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    init_rustls();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let address = format!("http://127.0.0.1:{port}/");
    let config = configuration(Environment::Production, &[(SERVICE_ADDRESS_KEY, address.as_str())]);
    let client = ServiceHttpClient::with_base_url(&config, None).unwrap();

    let result = client
        .get::<OrderResponse>("orders", &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(vault_services::ServiceError::Transport(_))
    ));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "customerId": "c-7", "items": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "orderId": "new" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let request = CreateOrder {
        customer_id: "c-7".to_string(),
        items: vec!["a".to_string(), "b".to_string()],
    };
    let outcome = client
        .post::<_, OrderResponse>(&request, "orders", &CancellationToken::new())
        .await
        .unwrap();

    let order = outcome.into_inner();
    assert_eq!(order.order_id, "new");
    assert_eq!(order.status_code(), 201);
    assert_eq!(order.status_message(), "Created");
}

#[tokio::test]
async fn test_empty_success_body_yields_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let outcome = client
        .get::<OrderResponse>("/ping", &CancellationToken::new())
        .await
        .unwrap();

    let order = outcome.into_inner();
    assert_eq!(order.status_code(), 204);
    assert!(order.order_id.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let result = client
        .get::<OrderResponse>("/orders", &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(vault_services::ServiceError::Deserialize(_))
    ));
}

#[tokio::test]
async fn test_cancelled_request_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .get::<OrderResponse>("/slow", &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
