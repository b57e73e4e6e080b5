use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use service::KvService;

use crate::errors::JsonApiError;

type Svc = State<Arc<KvService>>;
type KeyPath = Result<Path<String>, PathRejection>;
type RawBody = Result<Bytes, BytesRejection>;

/// Undecodable keys (e.g. `%FF`) answer with the usual JSON error body.
fn key_of(path: KeyPath) -> Result<String, JsonApiError> {
    path.map(|Path(key)| key)
        .map_err(|rej| JsonApiError::bad_request(rej.body_text()))
}

/// Oversized or unreadable bodies keep their status (413 / 400) but get a JSON body.
fn body_of(body: RawBody) -> Result<Bytes, JsonApiError> {
    body.map_err(|rej| {
        let status = rej.status();
        JsonApiError::new(status, status.canonical_reason().unwrap_or("Bad Request"), Some(rej.body_text()))
    })
}

/// Accepts `application/json` and any `+json` media type.
fn require_json(headers: &HeaderMap) -> Result<(), JsonApiError> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase());
    match mime {
        Some(m) if m == "application/json" || m.ends_with("+json") => Ok(()),
        _ => Err(JsonApiError::bad_request("content-type must be application/json")),
    }
}

pub async fn get_all(State(svc): Svc) -> Result<Json<HashMap<String, Value>>, JsonApiError> {
    Ok(Json(svc.get_all().await?))
}

pub async fn put_key(
    State(svc): Svc,
    path: KeyPath,
    headers: HeaderMap,
    body: RawBody,
) -> Result<(StatusCode, Json<Value>), JsonApiError> {
    let key = key_of(path)?;
    require_json(&headers)?;
    let body = body_of(body)?;
    svc.put(&key, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({"ok": true}))))
}

pub async fn get_key(State(svc): Svc, path: KeyPath) -> Result<Json<Value>, JsonApiError> {
    let key = key_of(path)?;
    match svc.get(&key).await? {
        Some(value) => Ok(Json(value)),
        None => Err(JsonApiError::not_found(&key)),
    }
}

pub async fn delete_key(State(svc): Svc, path: KeyPath) -> Result<Json<Value>, JsonApiError> {
    let key = key_of(path)?;
    if svc.delete(&key).await? {
        Ok(Json(json!({"ok": true})))
    } else {
        Err(JsonApiError::not_found(&key))
    }
}

pub async fn put_empty_key(
    state: Svc,
    headers: HeaderMap,
    body: RawBody,
) -> Result<(StatusCode, Json<Value>), JsonApiError> {
    put_key(state, Ok(Path(String::new())), headers, body).await
}

pub async fn get_empty_key(state: Svc) -> Result<Json<Value>, JsonApiError> {
    get_key(state, Ok(Path(String::new()))).await
}

pub async fn delete_empty_key(state: Svc) -> Result<Json<Value>, JsonApiError> {
    delete_key(state, Ok(Path(String::new()))).await
}

pub async fn nuke(State(svc): Svc, headers: HeaderMap, body: RawBody) -> Result<Json<Value>, JsonApiError> {
    // a disabled nuke is reported before the body is looked at
    let body = if svc.allow_nuke() {
        require_json(&headers)?;
        body_of(body)?
    } else {
        Bytes::new()
    };
    svc.nuke(&body).await?;
    Ok(Json(json!({"ok": true})))
}
