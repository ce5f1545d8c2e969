//! Data access layer: the generic record-access contract over the admin API.
//!
//! Records are opaque `serde_json::Value` maps forwarded to and from the
//! backend unmodified; this layer only knows about the envelope (`data` /
//! resource-keyed array plus `total`), the pagination and sort vocabulary,
//! and which operations each resource supports. Write operations are gated
//! on capability and on a present session token before any network call.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiClient, ApiResponse};
use crate::config::ParseMode;
use crate::error::{BatchFailure, Error, Result};
use crate::resource::Resource;

/// Sort direction, serialized the way the backend expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination, sorting and filtering for `list`-shaped operations.
///
/// Filters are forwarded verbatim as query parameters; authoritative
/// ordering is backend-determined.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub filter: BTreeMap<String, String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            sort_field: "id".to_string(),
            sort_order: SortOrder::Asc,
            filter: BTreeMap::new(),
        }
    }
}

impl ListParams {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
            ("sort_field".to_string(), self.sort_field.clone()),
            ("sort_order".to_string(), self.sort_order.as_str().to_string()),
        ];
        for (field, value) in &self.filter {
            query.push((field.clone(), value.clone()));
        }
        query
    }
}

/// A page of records plus the backend's total count.
#[derive(Debug, Clone)]
pub struct ListResult {
    pub records: Vec<Value>,
    pub total: u64,
}

/// Date-range aggregate metrics for the dashboard. `success_rate` is
/// computed server-side on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub error_requests: u64,
    pub success_rate: f64,
}

pub struct DataProvider {
    client: ApiClient,
    parse_mode: ParseMode,
}

impl DataProvider {
    pub fn new(client: ApiClient, parse_mode: ParseMode) -> Self {
        Self { client, parse_mode }
    }

    /// Fetch one page of records.
    pub async fn list(&self, resource: Resource, params: &ListParams) -> Result<ListResult> {
        let response = self.client.get(resource.path(), &params.to_query()).await?;
        self.extract_list(resource, response)
    }

    /// Fetch a single record by id. Missing records surface as `NotFound`.
    pub async fn get_one(&self, resource: Resource, id: &str) -> Result<Value> {
        let path = format!("{}/{}", resource.path(), id);
        match self.client.get(&path, &[]).await {
            Ok(response) => Ok(extract_record(resource, response.body, None)),
            Err(Error::Request {
                status: Some(404), ..
            }) => Err(Error::NotFound {
                resource,
                id: id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Bulk fetch by id list. The backend returns whatever subset it has;
    /// no guarantee every id is present in the result.
    pub async fn get_many(&self, resource: Resource, ids: &[String]) -> Result<Vec<Value>> {
        let query = vec![("ids".to_string(), ids.join(","))];
        let response = self.client.get(resource.path(), &query).await?;
        Ok(self.extract_list(resource, response)?.records)
    }

    /// Like `list`, filtered to records whose `target` field equals
    /// `target_id`.
    pub async fn get_many_reference(
        &self,
        resource: Resource,
        target: &str,
        target_id: &str,
        params: &ListParams,
    ) -> Result<ListResult> {
        let mut query = params.to_query();
        query.push((target.to_string(), target_id.to_string()));
        let response = self.client.get(resource.path(), &query).await?;
        self.extract_list(resource, response)
    }

    /// Create a record. Only creatable resources are accepted; the returned
    /// record carries the backend-assigned id.
    pub async fn create(&self, resource: Resource, data: Value) -> Result<Value> {
        if !resource.capabilities().creatable {
            return Err(Error::Validation {
                resource,
                reason: "resource is read-only and cannot be created".to_string(),
            });
        }
        self.require_session()?;

        let response = self.client.post(resource.path(), &data).await?;
        Ok(extract_record(resource, response.body, Some(data)))
    }

    /// Full-record replace. The backend receives exactly the fields
    /// submitted, not a merge.
    pub async fn update(&self, resource: Resource, id: &str, data: Value) -> Result<Value> {
        if !resource.capabilities().writable {
            return Err(Error::Validation {
                resource,
                reason: "resource is read-only and cannot be updated".to_string(),
            });
        }
        self.require_session()?;

        let path = format!("{}/{}", resource.path(), id);
        let response = self.client.put(&path, &data).await?;

        // Older backend variants ack updates with a bare message instead of
        // echoing the record, so fall back to the submitted payload.
        let mut record = extract_record(resource, response.body, Some(data));
        attach_id(&mut record, id);
        Ok(record)
    }

    /// Apply one update per id, all in flight at once. Successes stand even
    /// when siblings fail; failures come back aggregated per id.
    pub async fn update_many(
        &self,
        resource: Resource,
        ids: &[String],
        data: &Value,
    ) -> Result<Vec<String>> {
        if !resource.capabilities().writable {
            return Err(Error::Validation {
                resource,
                reason: "resource is read-only and cannot be updated".to_string(),
            });
        }
        self.require_session()?;

        let outcomes = join_all(ids.iter().map(|id| {
            let data = data.clone();
            async move { (id.clone(), self.update(resource, id, data).await) }
        }))
        .await;

        collect_batch(resource, "update", outcomes)
    }

    /// Delete by id. Returns the caller-supplied prior record as
    /// confirmation; no re-fetch happens.
    pub async fn delete(&self, resource: Resource, id: &str, previous: Value) -> Result<Value> {
        if !resource.capabilities().deletable {
            return Err(Error::Validation {
                resource,
                reason: "resource is read-only and cannot be deleted".to_string(),
            });
        }
        self.require_session()?;

        let path = format!("{}/{}", resource.path(), id);
        self.client.delete(&path).await?;
        Ok(previous)
    }

    /// Same fan-out and partial-failure policy as [`update_many`].
    ///
    /// [`update_many`]: DataProvider::update_many
    pub async fn delete_many(&self, resource: Resource, ids: &[String]) -> Result<Vec<String>> {
        if !resource.capabilities().deletable {
            return Err(Error::Validation {
                resource,
                reason: "resource is read-only and cannot be deleted".to_string(),
            });
        }
        self.require_session()?;

        let outcomes = join_all(ids.iter().map(|id| async move {
            let path = format!("{}/{}", resource.path(), id);
            (id.clone(), self.client.delete(&path).await)
        }))
        .await;

        collect_batch(resource, "delete", outcomes)
    }

    /// Date-range aggregate metrics from `/admin/dashboard`.
    pub async fn get_dashboard(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<DashboardStats> {
        let mut query = Vec::new();
        if let Some(start) = start_date {
            query.push(("start_date".to_string(), start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end_date {
            query.push(("end_date".to_string(), end.format("%Y-%m-%d").to_string()));
        }

        let response = self.client.get("/admin/dashboard", &query).await?;
        serde_json::from_value(response.body).map_err(|err| Error::Request {
            status: Some(response.status),
            message: format!("malformed dashboard response: {err}"),
            source: None,
        })
    }

    fn require_session(&self) -> Result<()> {
        if self.client.session().get().is_none() {
            return Err(Error::AuthenticationRequired);
        }
        Ok(())
    }

    /// Extract `(records, total)` from a list envelope. Accepts both the
    /// `data` key and the resource-keyed field; anything else is either an
    /// empty result (lenient) or a request error (strict).
    fn extract_list(&self, resource: Resource, response: ApiResponse) -> Result<ListResult> {
        let body = response.body;
        let records = body
            .get("data")
            .and_then(Value::as_array)
            .or_else(|| body.get(resource.record_key()).and_then(Value::as_array));

        match records {
            Some(records) => {
                let total = body
                    .get("total")
                    .and_then(Value::as_u64)
                    .unwrap_or(records.len() as u64);
                Ok(ListResult {
                    records: records.clone(),
                    total,
                })
            }
            None if self.parse_mode == ParseMode::Lenient => {
                debug!(%resource, "List envelope missing record array; treating as empty");
                Ok(ListResult {
                    records: Vec::new(),
                    total: 0,
                })
            }
            None => Err(Error::Request {
                status: Some(response.status),
                message: format!("list envelope for {resource} is missing its record array"),
                source: None,
            }),
        }
    }
}

/// Extract a single record from `data`, the singular resource key, or the
/// body itself; a bare `{"message": ...}` ack falls back to the submitted
/// payload when one is available.
fn extract_record(resource: Resource, body: Value, fallback: Option<Value>) -> Value {
    if let Some(record) = body.get("data").filter(|v| v.is_object()) {
        return record.clone();
    }
    if let Some(record) = body.get(resource.singular_key()).filter(|v| v.is_object()) {
        return record.clone();
    }

    let is_ack = match body.as_object() {
        Some(map) => map.len() <= 1 && map.contains_key("message"),
        None => true,
    };
    if !is_ack {
        return body;
    }
    fallback.unwrap_or(body)
}

fn attach_id(record: &mut Value, id: &str) {
    if let Value::Object(map) = record {
        map.entry("id")
            .or_insert_with(|| Value::String(id.to_string()));
    }
}

fn collect_batch<T>(
    resource: Resource,
    operation: &'static str,
    outcomes: Vec<(String, Result<T>)>,
) -> Result<Vec<String>> {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(_) => succeeded.push(id),
            Err(err) => failed.push(BatchFailure {
                id,
                reason: err.to_string(),
            }),
        }
    }

    if failed.is_empty() {
        Ok(succeeded)
    } else {
        Err(Error::Batch {
            resource,
            operation,
            succeeded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client_for, spawn_backend};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post, put};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn provider_for(base_url: &str, parse_mode: ParseMode) -> DataProvider {
        let client = client_for(base_url);
        client.session().set("tok", "admin", "alice");
        DataProvider::new(client, parse_mode)
    }

    #[tokio::test]
    async fn list_returns_records_and_total() {
        let app = Router::new().route(
            "/admin/parameters",
            get(|| async { Json(json!({"data": [{"id": "1", "name": "plate"}], "total": 1})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let result = provider
            .list(Resource::Parameters, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.total, 1);
        assert_eq!(result.records[0]["name"], json!("plate"));
    }

    #[tokio::test]
    async fn list_accepts_resource_keyed_envelopes() {
        let app = Router::new().route(
            "/admin/parameters",
            get(|| async {
                Json(json!({"parameters": [{"id": "1"}, {"id": "2"}], "total": 2}))
            }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let result = provider
            .list(Resource::Parameters, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn missing_total_defaults_to_record_count() {
        let app = Router::new().route(
            "/admin/users",
            get(|| async { Json(json!({"data": [{"id": "1"}, {"id": "2"}, {"id": "3"}]})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let result = provider
            .list(Resource::Users, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn malformed_envelope_is_empty_under_lenient_parsing() {
        let app = Router::new().route(
            "/admin/parameters",
            get(|| async { Json(json!({"data": "not-a-sequence"})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let result = provider
            .list(Resource::Parameters, &ListParams::default())
            .await
            .unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn malformed_envelope_fails_under_strict_parsing() {
        let app = Router::new().route(
            "/admin/parameters",
            get(|| async { Json(json!({"unexpected": true})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Strict);
        let err = provider
            .list(Resource::Parameters, &ListParams::default())
            .await
            .unwrap_err();
        match err {
            Error::Request { status, message, .. } => {
                assert_eq!(status, Some(200));
                assert!(message.contains("record array"));
            }
            other => panic!("expected Request error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filters_and_sort_reach_the_backend() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let app = Router::new().route(
            "/admin/requests",
            get(
                move |axum::extract::Query(params): axum::extract::Query<
                    Vec<(String, String)>,
                >| {
                    let seen = seen_clone.clone();
                    async move {
                        *seen.lock().unwrap() = params;
                        Json(json!({"data": [], "total": 0}))
                    }
                },
            ),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let mut params = ListParams {
            page: 2,
            per_page: 25,
            sort_field: "created_at".to_string(),
            sort_order: SortOrder::Desc,
            ..ListParams::default()
        };
        params.filter.insert("status".to_string(), "error".to_string());
        provider.list(Resource::Requests, &params).await.unwrap();

        let query = seen.lock().unwrap().clone();
        assert!(query.contains(&("page".to_string(), "2".to_string())));
        assert!(query.contains(&("per_page".to_string(), "25".to_string())));
        assert!(query.contains(&("sort_field".to_string(), "created_at".to_string())));
        assert!(query.contains(&("sort_order".to_string(), "DESC".to_string())));
        assert!(query.contains(&("status".to_string(), "error".to_string())));
    }

    #[tokio::test]
    async fn get_many_joins_ids() {
        let app = Router::new().route(
            "/admin/users",
            get(
                |axum::extract::Query(params): axum::extract::Query<
                    std::collections::HashMap<String, String>,
                >| async move {
                    assert_eq!(params.get("ids").map(String::as_str), Some("1,2,3"));
                    Json(json!({"users": [{"id": "1"}, {"id": "3"}]}))
                },
            ),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let records = provider
            .get_many(
                Resource::Users,
                &["1".to_string(), "2".to_string(), "3".to_string()],
            )
            .await
            .unwrap();
        // The backend may return a subset; forward it as-is.
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn get_many_reference_adds_the_target_filter() {
        let app = Router::new().route(
            "/admin/requests",
            get(
                |axum::extract::Query(params): axum::extract::Query<
                    std::collections::HashMap<String, String>,
                >| async move {
                    assert_eq!(params.get("extraction_id").map(String::as_str), Some("x-9"));
                    Json(json!({"data": [{"id": "1"}], "total": 1}))
                },
            ),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let result = provider
            .get_many_reference(
                Resource::Requests,
                "extraction_id",
                "x-9",
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn get_one_maps_404_to_not_found() {
        let app = Router::new().route(
            "/admin/parameters/:id",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "Parameter not found"})),
                )
            }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let err = provider
            .get_one(Resource::Parameters, "missing")
            .await
            .unwrap_err();
        match err {
            Error::NotFound { resource, id } => {
                assert_eq!(resource, Resource::Parameters);
                assert_eq!(id, "missing");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_unwraps_the_singular_envelope() {
        let app = Router::new().route(
            "/admin/parameters",
            post(|Json(body): Json<Value>| async move {
                (
                    StatusCode::CREATED,
                    Json(json!({"parameter": {
                        "id": "abc123",
                        "name": body["name"],
                        "active": true,
                    }})),
                )
            }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let record = provider
            .create(Resource::Parameters, json!({"name": "plate"}))
            .await
            .unwrap();
        assert_eq!(record["id"], json!("abc123"));
        assert_eq!(record["name"], json!("plate"));
    }

    // The two gate tests never reach the network, so a plain blocking
    // executor is enough.
    #[test]
    fn create_rejects_read_only_resources_before_any_network_call() {
        // No backend at all: the capability gate must fire first.
        let provider = provider_for("http://127.0.0.1:1", ParseMode::Lenient);
        let err = tokio_test::block_on(
            provider.create(Resource::Requests, json!({"endpoint": "/x"})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                resource: Resource::Requests,
                ..
            }
        ));
    }

    #[test]
    fn writes_require_a_session() {
        let client = client_for("http://127.0.0.1:1");
        let provider = DataProvider::new(client, ParseMode::Lenient);
        let err = tokio_test::block_on(
            provider.create(Resource::Parameters, json!({"name": "plate"})),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired));

        let err = tokio_test::block_on(provider.delete(Resource::Users, "1", Value::Null))
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired));
    }

    #[tokio::test]
    async fn update_echoes_the_submitted_record_on_bare_acks() {
        let app = Router::new().route(
            "/admin/users/:id",
            put(|| async { Json(json!({"message": "User updated successfully"})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let record = provider
            .update(Resource::Users, "7", json!({"username": "bob", "role": "user"}))
            .await
            .unwrap();
        assert_eq!(record["id"], json!("7"));
        assert_eq!(record["username"], json!("bob"));
    }

    #[tokio::test]
    async fn update_many_keeps_successes_and_names_the_failures() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let applied_clone = applied.clone();
        let app = Router::new().route(
            "/admin/users/:id",
            put(move |Path(id): Path<String>, Json(_): Json<Value>| {
                let applied = applied_clone.clone();
                async move {
                    if id == "2" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"message": "Role is invalid"})),
                        );
                    }
                    applied.lock().unwrap().push(id);
                    (StatusCode::OK, Json(json!({"message": "updated"})))
                }
            }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let err = provider
            .update_many(
                Resource::Users,
                &["1".to_string(), "2".to_string()],
                &json!({"role": "user"}),
            )
            .await
            .unwrap_err();

        match err {
            Error::Batch {
                succeeded, failed, ..
            } => {
                assert_eq!(succeeded, vec!["1".to_string()]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].id, "2");
                assert!(failed[0].reason.contains("Role is invalid"));
            }
            other => panic!("expected Batch error, got {other:?}"),
        }
        // Id 1 was applied and not rolled back.
        assert_eq!(applied.lock().unwrap().clone(), vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn delete_returns_the_previous_record() {
        let app = Router::new().route(
            "/admin/parameters/:id",
            delete(|| async { Json(json!({"message": "Parameter deleted successfully"})) }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let previous = json!({"id": "1", "name": "plate"});
        let returned = provider
            .delete(Resource::Parameters, "1", previous.clone())
            .await
            .unwrap();
        assert_eq!(returned, previous);
    }

    #[tokio::test]
    async fn delete_many_aggregates_per_id_outcomes() {
        let app = Router::new().route(
            "/admin/parameters/:id",
            delete(|Path(id): Path<String>| async move {
                if id == "nope" {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"message": "Parameter not found"})),
                    )
                } else {
                    (StatusCode::OK, Json(json!({"message": "deleted"})))
                }
            }),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let ok = provider
            .delete_many(Resource::Parameters, &["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        assert_eq!(ok, vec!["1".to_string(), "2".to_string()]);

        let err = provider
            .delete_many(Resource::Parameters, &["1".to_string(), "nope".to_string()])
            .await
            .unwrap_err();
        match err {
            Error::Batch { failed, .. } => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].id, "nope");
            }
            other => panic!("expected Batch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dashboard_stats_deserialize_with_dates_forwarded() {
        let app = Router::new().route(
            "/admin/dashboard",
            get(
                |axum::extract::Query(params): axum::extract::Query<
                    std::collections::HashMap<String, String>,
                >| async move {
                    assert_eq!(params.get("start_date").map(String::as_str), Some("2025-01-01"));
                    assert_eq!(params.get("end_date").map(String::as_str), Some("2025-01-31"));
                    Json(json!({
                        "total_requests": 120,
                        "successful_requests": 114,
                        "error_requests": 6,
                        "success_rate": 95.0,
                    }))
                },
            ),
        );
        let base_url = spawn_backend(app).await;

        let provider = provider_for(&base_url, ParseMode::Lenient);
        let stats = provider
            .get_dashboard(
                Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
                Some(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(stats.total_requests, 120);
        assert_eq!(stats.error_requests, 6);
        assert!((stats.success_rate - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_params_cover_the_first_page() {
        let params = ListParams::default();
        let query = params.to_query();
        assert!(query.contains(&("page".to_string(), "1".to_string())));
        assert!(query.contains(&("sort_order".to_string(), "ASC".to_string())));
    }
}
