use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Content type the legacy endpoints answer with.
pub const PHP_CONTENT_TYPE: &str = "application/php";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub name: Option<String>,
}

pub type Db = Arc<RwLock<Vec<Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/legacy/items", get(list_items_serialized))
        .route("/moved", get(moved))
        .route("/moved-twice", get(moved_twice))
        .route("/notes", get(notes))
        .route("/echo", get(echo).post(echo).put(echo).delete(echo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], "not found").into_response()
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    Json(db.read().await.clone())
}

async fn create_item(State(db): State<Db>, Form(input): Form<ItemForm>) -> Response {
    let name = match input.name.filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => return bad_request("name is required"),
    };
    let item = Item {
        id: Uuid::new_v4(),
        name,
    };
    db.write().await.push(item.clone());
    Json(item).into_response()
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.read().await.iter().find(|i| i.id == id) {
        Some(item) => Json(item.clone()).into_response(),
        None => not_found(),
    }
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Form(input): Form<ItemForm>,
) -> Response {
    let mut items = db.write().await;
    let Some(item) = items.iter_mut().find(|i| i.id == id) else {
        return not_found();
    };
    match input.name {
        Some(name) if name.is_empty() => return bad_request("name must not be empty"),
        Some(name) => item.name = name,
        None => {}
    }
    Json(item.clone()).into_response()
}

async fn delete_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    let mut items = db.write().await;
    let before = items.len();
    items.retain(|i| i.id != id);
    if items.len() == before {
        return not_found();
    }
    Json(json!({ "deleted": id })).into_response()
}

/// The item list in PHP `serialize()` format.
async fn list_items_serialized(State(db): State<Db>) -> Response {
    let items = db.read().await;
    let mut out = format!("a:{}:{{", items.len());
    for (index, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "i:{index};a:2:{{{}{}{}{}}}",
            php_string("id"),
            php_string(&item.id.to_string()),
            php_string("name"),
            php_string(&item.name),
        ));
    }
    out.push('}');
    ([(header::CONTENT_TYPE, PHP_CONTENT_TYPE)], out).into_response()
}

fn php_string(s: &str) -> String {
    format!("s:{}:\"{s}\";", s.len())
}

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn moved() -> Response {
    found("/items")
}

async fn moved_twice() -> Response {
    found("/moved")
}

async fn notes() -> Response {
    ([(header::CONTENT_TYPE, "text/plain")], "remember the milk").into_response()
}

/// Reflects the query parameters, form body and interesting request headers.
async fn echo(
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: String,
) -> Json<serde_json::Value> {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "query": query,
        "body": body,
        "user_agent": header_value(header::USER_AGENT),
        "authorization": header_value(header::AUTHORIZATION),
        "content_type": header_value(header::CONTENT_TYPE),
    }))
}
