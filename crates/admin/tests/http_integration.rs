use admin::{AdminState, create_router};
use logkeeper_common::{AccessMode, AccessVerifier, Database, TenantRegistry, TenantRepository};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

const ADMIN_KEY: &str = "integration-admin-key-0123456789";

struct TestServer {
    base_url: String,
    registry: Arc<TenantRegistry>,
    _temp_dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_test_server() -> TestServer {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Database::new(temp_dir.path())
        .await
        .expect("Failed to open database");
    let repo = TenantRepository::new(db);

    let registry = Arc::new(TenantRegistry::new(Arc::new(repo.clone())));
    registry.refresh(None).await.expect("Failed to load registry");
    let verifier = Arc::new(AccessVerifier::new(registry.clone(), ADMIN_KEY, "ops@x.com"));

    let app = create_router(AdminState::new(repo, verifier));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read bound addr");
    let base_url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Admin test server exited unexpectedly");
    });

    TestServer {
        base_url,
        registry,
        _temp_dir: temp_dir,
        handle,
    }
}

fn service(tenant: &str, read_key: &str, write_key: &str) -> Value {
    json!({
        "tenant": tenant,
        "read": { "apiKey": read_key, "ips": ["0.0.0.0"] },
        "write": { "apiKey": write_key, "ips": ["10.0.0.1", "10.0.0.2"] },
        "mailTo": "a@x.com"
    })
}

async fn create(client: &reqwest::Client, server: &TestServer, key: &str, body: Value) -> (StatusCode, Value) {
    let resp = client
        .post(format!("{}/services", server.base_url))
        .header("x-api-key", key)
        .json(&body)
        .send()
        .await
        .expect("create request failed");
    let status = resp.status();
    (status, resp.json().await.expect("create response should parse"))
}

#[tokio::test]
async fn test_service_lifecycle() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    assert!(server.registry.is_empty());

    // 空注册表时管理员也能创建第一个租户
    let (status, body) = create(&client, &server, ADMIN_KEY, service("acme", "rk1", "wk1")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "message": "Success", "tenant": "acme" }));
    assert_eq!(server.registry.len(), 1);

    let (status, body) = create(&client, &server, ADMIN_KEY, service("acme", "rk2", "wk2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Domain already exists");

    // 与已有租户的写 Key 冲突
    let (status, body) = create(&client, &server, ADMIN_KEY, service("beta", "wk1", "wk9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "API key already in use");

    // 同一记录内读写 Key 相同
    let (status, body) = create(&client, &server, ADMIN_KEY, service("gamma", "same", "same")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "API key already in use");

    let (status, _) = create(&client, &server, ADMIN_KEY, service("beta", "rk2", "wk2")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(server.registry.len(), 2);

    let resp = client
        .get(format!("{}/services", server.base_url))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let services = body["services"].as_array().expect("services should be an array");
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["tenant"], "acme");
    assert_eq!(services[0]["write"]["ips"], json!(["10.0.0.1", "10.0.0.2"]));

    let resp = client
        .delete(format!("{}/services/acme", server.base_url))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Success", "tenant": "acme" }));
    assert_eq!(server.registry.len(), 1);
    assert_eq!(server.registry.current()[0].tenant, "beta");
}

#[tokio::test]
async fn test_malformed_service_rejected() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let (status, body) = create(&client, &server, ADMIN_KEY, json!({ "tenant": "acme" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({ "message": "Malformed Data" }));

    let mut empty_ips = service("acme", "rk1", "wk1");
    empty_ips["read"]["ips"] = json!([]);
    let (status, body) = create(&client, &server, ADMIN_KEY, empty_ips).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Malformed Data");

    assert!(server.registry.is_empty());
}

#[tokio::test]
async fn test_non_admin_key_rejected() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let (status, _) = create(&client, &server, ADMIN_KEY, service("acme", "rk1", "wk1")).await;
    assert_eq!(status, StatusCode::CREATED);

    // 租户自己的 Key 不能管理租户
    let (status, body) = create(&client, &server, "rk1", service("beta", "rk2", "wk2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Access Denied" }));

    let resp = client
        .get(format!("{}/services", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .delete(format!("{}/services/acme", server.base_url))
        .header("x-api-key", "wk1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_admin_key_cannot_be_tenant_key() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let (status, body) = create(&client, &server, ADMIN_KEY, service("acme", ADMIN_KEY, "wk1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "API key already in use" }));

    let (status, body) = create(&client, &server, ADMIN_KEY, service("acme", "rk1", ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "API key already in use");
    assert!(server.registry.is_empty());

    // 格式错误优先于 Key 冲突
    let mut empty_ips = service("acme", ADMIN_KEY, "wk1");
    empty_ips["write"]["ips"] = json!([]);
    let (status, _) = create(&client, &server, ADMIN_KEY, empty_ips).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = create(&client, &server, ADMIN_KEY, service("acme", "rk1", "wk1")).await;
    assert_eq!(status, StatusCode::CREATED);

    // 创建成功的租户能用自己的读 Key 通过校验
    let verifier = AccessVerifier::new(server.registry.clone(), ADMIN_KEY, "ops@x.com");
    let grant = verifier
        .verify(AccessMode::Read, Some("rk1"), Some("1.2.3.4"), None)
        .expect("tenant read key should authorize");
    assert_eq!(grant.tenant, "acme");
}
