use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use configs::{AppConfig, StoreBackend, StoreConfig};
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use service::{storage::MemoryStore, KvService};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use server::routes;

fn cors() -> CorsLayer { CorsLayer::very_permissive() }

struct TestApp {
    base_url: String,
}

async fn spawn(app: Router) -> anyhow::Result<TestApp> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url })
}

async fn start_server(allow_nuke: bool) -> anyhow::Result<TestApp> {
    let svc = KvService::new("e2e", Arc::new(MemoryStore::new())).with_allow_nuke(allow_nuke);
    spawn(routes::build_router(Arc::new(svc), cors())).await
}

/// Full startup path from configuration, backed by the given engine.
async fn start_from_config(store: StoreConfig, database_url: Option<&str>) -> anyhow::Result<TestApp> {
    let mut cfg = AppConfig { store, ..AppConfig::default() };
    if let Some(url) = database_url {
        cfg.database.url = url.to_string();
        cfg.database.max_connections = 1;
        cfg.database.min_connections = 1;
    }
    let app = server::startup::build_app(&cfg).await?;
    spawn(app).await
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn put_json(c: &reqwest::Client, url: String, body: &Value) -> anyhow::Result<HttpStatusCode> {
    Ok(c.put(url).json(body).send().await?.status())
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_put_get_delete_get() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let c = client();
    let url = format!("{}/v1/key/TEST_KEY", app.base_url);

    assert_eq!(put_json(&c, url.clone(), &json!([1, 2, 3])).await?, HttpStatusCode::CREATED);

    let res = c.get(&url).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!([1, 2, 3]));

    let res = c.delete(&url).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c.get(&url).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_round_trip_rich_object() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let c = client();
    let value = json!({
        "a": "value-a",
        "number": 31338,
        "array": ["x", "y"],
        "flag": true,
        "nested": {"unicode": "✓✓✓", "list": [{"deep": null}]}
    });
    let url = format!("{}/v1/key/rich", app.base_url);
    assert_eq!(put_json(&c, url.clone(), &value).await?, HttpStatusCode::CREATED);
    let got = c.get(&url).send().await?.json::<Value>().await?;
    assert_eq!(got, value);
    Ok(())
}

#[tokio::test]
async fn e2e_rejects_invalid_bodies() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let c = client();
    let url = format!("{}/v1/key/k", app.base_url);

    for body in ["null", "\"x\"", "5", ""] {
        let res = c
            .put(&url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?;
        assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST, "body {body:?}");
    }

    // nothing was stored
    let all = c.get(format!("{}/v1/all", app.base_url)).send().await?.json::<Value>().await?;
    assert_eq!(all, json!({}));
    Ok(())
}

#[tokio::test]
async fn e2e_get_all_reflects_upserts() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let c = client();
    let res = c.get(format!("{}/v1/all", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({}));

    put_json(&c, format!("{}/v1/key/a", app.base_url), &json!({"n": 1})).await?;
    put_json(&c, format!("{}/v1/key/b", app.base_url), &json!([true])).await?;
    put_json(&c, format!("{}/v1/key/a", app.base_url), &json!({"n": 2})).await?;

    let all = c.get(format!("{}/v1/all", app.base_url)).send().await?.json::<Value>().await?;
    assert_eq!(all, json!({"a": {"n": 2}, "b": [true]}));
    Ok(())
}

#[tokio::test]
async fn e2e_nuke_requires_flag_and_confirmation() -> anyhow::Result<()> {
    let c = client();

    let disabled = start_server(false).await?;
    let res = c.post(format!("{}/v1/nuke", disabled.base_url)).json(&json!({"nuke": true})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let app = start_server(true).await?;
    put_json(&c, format!("{}/v1/key/a", app.base_url), &json!([1])).await?;

    let res = c.post(format!("{}/v1/nuke", app.base_url)).json(&json!({})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let res = c.post(format!("{}/v1/nuke", app.base_url)).json(&json!({"nuke": true})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let all = c.get(format!("{}/v1/all", app.base_url)).send().await?.json::<Value>().await?;
    assert_eq!(all, json!({}));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn e2e_concurrent_upserts_converge() -> anyhow::Result<()> {
    let app = start_server(false).await?;
    let c = client();
    let keys = 16;
    let rounds = 10;

    let mut handles = Vec::new();
    for k in 0..keys {
        let c = c.clone();
        let url = format!("{}/v1/key/key-{k}", app.base_url);
        handles.push(tokio::spawn(async move {
            for r in 0..rounds {
                let status = put_json(&c, url.clone(), &json!({"key": k, "round": r})).await?;
                anyhow::ensure!(status == HttpStatusCode::CREATED, "unexpected status {status}");
            }
            Ok::<(), anyhow::Error>(())
        }));
    }
    for h in handles {
        h.await??;
    }

    let all = c.get(format!("{}/v1/all", app.base_url)).send().await?.json::<Value>().await?;
    let all = all.as_object().ok_or_else(|| anyhow::anyhow!("expected object"))?;
    assert_eq!(all.len(), keys);
    for k in 0..keys {
        assert_eq!(all[&format!("key-{k}")], json!({"key": k, "round": rounds - 1}));
    }
    Ok(())
}

#[tokio::test]
async fn e2e_instances_are_isolated() -> anyhow::Result<()> {
    let a = Arc::new(KvService::new("a", Arc::new(MemoryStore::new())));
    let b = Arc::new(KvService::new("b", Arc::new(MemoryStore::new())));
    let app = spawn(routes::nest_instances(
        [("/a".to_string(), a), ("/b".to_string(), b)],
        cors(),
    ))
    .await?;
    let c = client();

    put_json(&c, format!("{}/a/v1/key/shared", app.base_url), &json!(["from-a"])).await?;
    let res = c.get(format!("{}/b/v1/key/shared", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    let res = c.get(format!("{}/a/v1/key/shared", app.base_url)).send().await?;
    assert_eq!(res.json::<Value>().await?, json!(["from-a"]));
    Ok(())
}

#[tokio::test]
async fn e2e_database_backend_from_config() -> anyhow::Result<()> {
    let store = StoreConfig { backend: StoreBackend::Database, ..StoreConfig::default() };
    let app = start_from_config(store, Some("sqlite::memory:")).await?;
    let c = client();
    let url = format!("{}/v1/key/TEST_KEY", app.base_url);

    assert_eq!(put_json(&c, url.clone(), &json!([1, 2, 3])).await?, HttpStatusCode::CREATED);
    assert_eq!(c.get(&url).send().await?.json::<Value>().await?, json!([1, 2, 3]));
    assert_eq!(c.delete(&url).send().await?.status(), HttpStatusCode::OK);
    assert_eq!(c.get(&url).send().await?.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_file_backend_survives_restart() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("kv_e2e_{}.json", Uuid::new_v4()));
    let store = StoreConfig {
        backend: StoreBackend::File,
        file_path: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };
    let c = client();

    let first = start_from_config(store.clone(), None).await?;
    put_json(&c, format!("{}/v1/key/persisted", first.base_url), &json!({"v": 1})).await?;

    let second = start_from_config(store, None).await?;
    let res = c.get(format!("{}/v1/key/persisted", second.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"v": 1}));

    let _ = tokio::fs::remove_file(&path).await;
    Ok(())
}

#[tokio::test]
async fn e2e_body_limit_follows_config() -> anyhow::Result<()> {
    let c = client();
    // roughly 3 MB once serialized, above the 2 MiB default
    let big = Value::Array(vec![json!("xxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"); 96 * 1024]);

    let mut cfg = AppConfig::default();
    cfg.server.max_body_bytes = 8 * 1024 * 1024;
    let roomy = spawn(server::startup::build_app(&cfg).await?).await?;
    let url = format!("{}/v1/key/big", roomy.base_url);
    assert_eq!(put_json(&c, url.clone(), &big).await?, HttpStatusCode::CREATED);
    assert_eq!(c.get(&url).send().await?.json::<Value>().await?, big);
    Ok(())
}
