use axum::{
    async_trait,
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, OriginalUri, Path, Query,
        Request, State,
    },
    http::{request::Parts, StatusCode},
    response::Json,
};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

use crate::model::Id;
use crate::seed::{PopulatePolicy, PopulateReport, SampleConfig, SampleGenerator};
use crate::store::{
    ErrorCategory, InstanceRegistry, InstanceSummary, ListQuery, Page, StoreError,
};

/// State shared by every handler.
#[derive(Debug)]
pub struct ServerState {
    pub registry: Arc<InstanceRegistry>,
    /// Instance used when a request carries no `X-Instance-Id` header.
    pub default_instance: Id,
    pub sample: SampleConfig,
}

pub type AppState = Arc<ServerState>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: &str, kind: ErrorCategory) -> Self {
        Self {
            error: message.to_string(),
            kind,
            field: None,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::NotFound | ErrorCategory::InstanceNotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
    }
}

/// Translate a store failure into its status code and JSON body.
pub fn error_response(err: StoreError) -> ApiError {
    let kind = err.category();
    let mut body = ErrorResponse::new(&err.to_string(), kind);
    body.field = err
        .violation()
        .and_then(|violation| violation.field())
        .map(str::to_string);
    (status_for(kind), Json(body))
}

pub fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, ErrorCategory::Validation)),
    )
}

/// JSON body extractor whose rejections use the API's error shape.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    bad_request(&rejection.body_text())
}

/// Query-string extractor whose rejections use the API's error shape.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(bad_request(&rejection.body_text())),
        }
    }
}

/// Path extractor whose rejections use the API's error shape.
pub struct PathParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParams<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParams(value)),
            Err(rejection) => Err(bad_request(&rejection.body_text())),
        }
    }
}

/// A page serialized as `{"<name>": [...], "total_entries": n}`.
#[derive(Debug)]
pub struct Collection<T> {
    name: &'static str,
    page: Page<T>,
}

impl<T> Collection<T> {
    pub fn new(name: &'static str, page: Page<T>) -> Self {
        Self { name, page }
    }

    /// Wrap a complete, unpaged list.
    pub fn all(name: &'static str, items: Vec<T>) -> Self {
        let total_entries = items.len();
        Self::new(
            name,
            Page {
                items,
                total_entries,
            },
        )
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.name, &self.page.items)?;
        map.serialize_entry("total_entries", &self.page.total_entries)?;
        map.end()
    }
}

/// Build a list query from the paging parameters every list endpoint takes.
pub fn list_query(
    limit: Option<usize>,
    offset: Option<usize>,
    order_by: &Option<String>,
) -> ListQuery {
    ListQuery {
        limit,
        offset,
        order_by: order_by.clone(),
    }
}

/// Split a comma separated query value, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Simple health check endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub default_instance: String,
    pub instances: usize,
    pub version: String,
    pub timestamp: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        default_instance: state.default_instance.clone(),
        instances: state.registry.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn not_found(uri: OriginalUri) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            &format!("no route for {}", uri.0.path()),
            ErrorCategory::NotFound,
        )),
    )
}

// Instance handlers

#[derive(Debug, Serialize)]
pub struct InstanceList {
    pub instances: Vec<InstanceSummary>,
    pub total_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct NewInstance {
    pub instance_id: Option<Id>,
    #[serde(default)]
    pub populate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopulateParams {
    pub policy: Option<PopulatePolicy>,
    pub seed: Option<u64>,
}

pub async fn list_instances(State(state): State<AppState>) -> Json<InstanceList> {
    let instances = state.registry.summaries();
    let total_entries = instances.len();
    Json(InstanceList {
        instances,
        total_entries,
    })
}

pub async fn create_instance(
    State(state): State<AppState>,
    Payload(new_instance): Payload<NewInstance>,
) -> Result<Json<InstanceSummary>, ApiError> {
    let instance_id = crate::model::require_identifier("instance_id", new_instance.instance_id)
        .map_err(|violation| error_response(violation.into()))?;
    let store = state
        .registry
        .create(&instance_id)
        .map_err(error_response)?;

    if new_instance.populate {
        SampleGenerator::new(state.sample.clone())
            .populate(&store)
            .map_err(error_response)?;
    }
    Ok(Json(store.summary()))
}

pub async fn get_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Id>,
) -> Result<Json<InstanceSummary>, ApiError> {
    match state.registry.get(&instance_id) {
        Ok(store) => Ok(Json(store.summary())),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn delete_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Id>,
) -> Result<Json<InstanceSummary>, ApiError> {
    match state.registry.remove(&instance_id) {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => Err(error_response(e)),
    }
}

/// Fill an existing instance with sample data. Query parameters override
/// the configured policy and seed.
pub async fn populate_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Id>,
    QueryParams(params): QueryParams<PopulateParams>,
) -> Result<Json<PopulateReport>, ApiError> {
    let store = state.registry.get(&instance_id).map_err(error_response)?;
    let mut config = state.sample.clone();
    if let Some(policy) = params.policy {
        config.policy = policy;
    }
    if params.seed.is_some() {
        config.seed = params.seed;
    }

    let report = SampleGenerator::new(config)
        .populate(&store)
        .map_err(error_response)?;
    Ok(Json(report))
}
