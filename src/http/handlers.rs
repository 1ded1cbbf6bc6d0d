//! HTTP handlers.
//!
//! Each items handler wraps exactly one store call in an operation span and
//! maps a store failure to a generic 500 body; error details go to the span
//! and the log, never to the client.

use axum::{
    body::Bytes,
    extract::{MatchedPath, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use opentelemetry::KeyValue;
use serde_json::json;

use crate::observability::prometheus::metrics_response;
use crate::observability::resource::{
    self, DB_ROWS_AFFECTED, DB_ROWS_RETURNED, ITEM_ID, ITEM_NAME,
};
use crate::observability::span::{CREATE_ITEM, DELETE_ITEM, LIST_ITEMS};
use crate::server::AppContext;
use crate::storage::{parse_item_id, NewItem};

fn error_response(message: &'static str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
}

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": ctx.identity.service_name(),
    }))
}

/// GET /metrics on the main listener; same snapshot as the dedicated scrape port.
pub async fn metrics(State(ctx): State<AppContext>) -> Response {
    metrics_response(&ctx.metrics)
}

/// GET /api/items
pub async fn list_items(
    State(ctx): State<AppContext>,
    method: Method,
    path: MatchedPath,
) -> Response {
    let attributes = ctx.operation_attributes(&LIST_ITEMS, &method, path.as_str());
    let store = ctx.store.clone();

    let result = ctx
        .run_operation(
            LIST_ITEMS,
            attributes,
            async move { store.list().await },
            |items| vec![KeyValue::new(DB_ROWS_RETURNED, items.len() as i64)],
        )
        .await;

    match result {
        Ok(items) => {
            ctx.metrics.set_item_count(items.len());
            Json(items).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Error fetching items");
            error_response("Failed to fetch items")
        }
    }
}

/// Lenient body parsing: an absent or malformed body yields empty fields,
/// which the database then rejects inside the operation span.
fn parse_new_item(body: &[u8]) -> NewItem {
    if body.is_empty() {
        return NewItem::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Unreadable item body, treating fields as absent");
        NewItem::default()
    })
}

/// POST /api/items
pub async fn create_item(
    State(ctx): State<AppContext>,
    method: Method,
    path: MatchedPath,
    body: Bytes,
) -> Response {
    let item = parse_new_item(&body);
    let mut attributes = ctx.operation_attributes(&CREATE_ITEM, &method, path.as_str());
    attributes.push(resource::string_or_empty(ITEM_NAME, item.name.as_deref()));
    let store = ctx.store.clone();

    let result = ctx
        .run_operation(
            CREATE_ITEM,
            attributes,
            async move { store.create(item).await },
            |created| vec![KeyValue::new(ITEM_ID, created.id)],
        )
        .await;

    match result {
        Ok(created) => {
            tracing::debug!(id = created.id, "Item created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Error creating item");
            error_response("Failed to create item")
        }
    }
}

/// DELETE /api/items/:id
///
/// Deleting an id that does not exist still answers 200.
pub async fn delete_item(
    State(ctx): State<AppContext>,
    method: Method,
    path: MatchedPath,
    Path(id): Path<String>,
) -> Response {
    let mut attributes = ctx.operation_attributes(&DELETE_ITEM, &method, path.as_str());
    attributes.push(KeyValue::new(ITEM_ID, id.clone()));
    let store = ctx.store.clone();

    let result = ctx
        .run_operation(
            DELETE_ITEM,
            attributes,
            async move {
                let id = parse_item_id(&id)?;
                store.delete(id).await
            },
            |removed| vec![KeyValue::new(DB_ROWS_AFFECTED, *removed as i64)],
        )
        .await;

    match result {
        Ok(_) => Json(json!({ "message": "Item deleted successfully" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error deleting item");
            error_response("Failed to delete item")
        }
    }
}

/// Fallback for unmatched paths.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_item_is_lenient() {
        let item = parse_new_item(br#"{"name":"foo","description":"bar"}"#);
        assert_eq!(item.name.as_deref(), Some("foo"));
        assert_eq!(item.description.as_deref(), Some("bar"));

        assert_eq!(parse_new_item(b""), NewItem::default());
        assert_eq!(parse_new_item(b"not json"), NewItem::default());
        assert_eq!(parse_new_item(br#"{"name":5}"#), NewItem::default());
    }
}
