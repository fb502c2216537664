//! Typed read endpoints. Handlers run the synchronous core on the blocking
//! pool; errors map onto the HTTP contract (400 malformed, 404 unknown,
//! 409 conflict, 422 integrity, 500 internal) with `{error, message}`
//! bodies.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use zeusapp::api::ZeusApi;
use zeusapp::ctx::OpCtx;
use zeusapp::error::ZeusError;
use zeusapp::graph::{EdgeLayer, EdgeRelation, GraphFilter, DEFAULT_FOCUS_DEPTH};
use zeusapp::model::{EntityId, Kind};
use zeusapp::store::ListFilter;

use super::AppState;

pub struct ApiError(ZeusError);

impl From<ZeusError> for ApiError {
    fn from(err: ZeusError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.tag(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run a core call on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ZeusApi, &OpCtx) -> zeusapp::error::Result<T> + Send + 'static,
{
    let api = state.api.clone();
    tokio::task::spawn_blocking(move || f(&api, &OpCtx::background()))
        .await
        .map_err(|err| ApiError(ZeusError::Internal(err.to_string())))?
        .map_err(ApiError)
}

pub async fn status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = blocking(&state, |api, ctx| api.status(ctx)).await?;
    Ok(Json(report))
}

pub async fn vision(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let value = blocking(&state, |api, ctx| api.vision(ctx)?.to_value()).await?;
    Ok(Json(value))
}

async fn kind_listing(state: AppState, kind: Kind) -> ApiResult<impl IntoResponse> {
    let values = blocking(&state, move |api, ctx| {
        api.list(ctx, kind, &ListFilter::default())?
            .iter()
            .map(|e| e.to_value())
            .collect::<zeusapp::error::Result<Vec<_>>>()
    })
    .await?;
    Ok(Json(values))
}

pub async fn objectives(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    kind_listing(state, Kind::Objective).await
}

pub async fn usecases(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    kind_listing(state, Kind::UseCase).await
}

pub async fn activities(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    kind_listing(state, Kind::Activity).await
}

pub async fn actors(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    kind_listing(state, Kind::Actor).await
}

pub async fn subsystems(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    kind_listing(state, Kind::Subsystem).await
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    focus: Option<String>,
    depth: Option<usize>,
    layers: Option<String>,
    relations: Option<String>,
    /// Include per-objective group boundaries (default true).
    group: Option<bool>,
    #[serde(rename = "hide-completed")]
    hide_completed: Option<bool>,
    #[serde(rename = "hide-draft")]
    hide_draft: Option<bool>,
}

fn parse_layers(raw: &str) -> Result<Vec<EdgeLayer>, ZeusError> {
    raw.split(',')
        .map(|part| match part.trim() {
            "structural" => Ok(EdgeLayer::Structural),
            "reference" => Ok(EdgeLayer::Reference),
            other => Err(ZeusError::BadShape(format!("unknown layer '{other}'"))),
        })
        .collect()
}

fn parse_relations(raw: &str) -> Result<Vec<EdgeRelation>, ZeusError> {
    raw.split(',')
        .map(|part| match part.trim() {
            "parent" => Ok(EdgeRelation::Parent),
            "contributes" => Ok(EdgeRelation::Contributes),
            "implements" => Ok(EdgeRelation::Implements),
            "depends_on" => Ok(EdgeRelation::DependsOn),
            other => Err(ZeusError::BadShape(format!("unknown relation '{other}'"))),
        })
        .collect()
}

pub async fn unified_graph(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = GraphFilter {
        focus: query.focus.as_deref().map(EntityId::parse).transpose()?,
        depth: query.depth.unwrap_or(DEFAULT_FOCUS_DEPTH),
        layers: query.layers.as_deref().map(parse_layers).transpose()?,
        relations: query.relations.as_deref().map(parse_relations).transpose()?,
        hide_completed: query.hide_completed.unwrap_or(false),
        hide_draft: query.hide_draft.unwrap_or(false),
    };
    let with_groups = query.group.unwrap_or(true);

    let mut payload = blocking(&state, move |api, ctx| api.unified_graph(ctx, &filter)).await?;
    if !with_groups {
        payload.layout.groups.clear();
    }
    Ok(Json(payload))
}

pub async fn uml_usecase(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let diagram = blocking(&state, |api, ctx| api.uml_usecase(ctx)).await?;
    Ok(Json(diagram))
}

#[derive(Debug, Deserialize)]
pub struct UmlActivityQuery {
    id: Option<String>,
}

pub async fn uml_activity(
    State(state): State<AppState>,
    Query(query): Query<UmlActivityQuery>,
) -> ApiResult<impl IntoResponse> {
    let raw = query
        .id
        .ok_or_else(|| ZeusError::BadShape("missing 'id' query parameter".into()))?;
    let id = EntityId::parse(&raw)?;
    let diagram = blocking(&state, move |api, ctx| api.uml_activity(ctx, &id)).await?;
    Ok(Json(diagram))
}
