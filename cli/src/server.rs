use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use mealgrid_core::error::{PlanError, plan_error};
use mealgrid_core::models::{
    CardDraft, CascadePreview, CategoryFilter, Cell, DayPlan, FoodCard, Ingredient,
    IngredientLine, MealType, StaleCard, validate_meal_type,
};
use mealgrid_core::schedule::DateRange;
use mealgrid_core::service::PlanService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<PlanService>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, PlanService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct CardListQuery {
    category: Option<String>,
    q: Option<String>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct CreateIngredientRequest {
    name: String,
    calories_per_unit: f64,
    unit: String,
}

#[derive(Deserialize)]
struct UpdateCardRequest {
    name: String,
    #[serde(default)]
    categories: BTreeSet<MealType>,
    #[serde(default)]
    ingredients: Vec<IngredientLine>,
    #[serde(default)]
    confirm: bool,
}

#[derive(Deserialize)]
struct PreviewRequest {
    categories: BTreeSet<MealType>,
}

#[derive(Deserialize)]
struct CellRequest {
    date: String,
    meal_type: String,
}

#[derive(Deserialize)]
struct ScheduleEntryRequest {
    #[serde(flatten)]
    cell: CellRequest,
    food_card_id: String,
}

#[derive(Deserialize)]
struct MoveRequest {
    food_card_id: String,
    from: CellRequest,
    to: CellRequest,
}

#[derive(Serialize)]
struct CardDetail<'a> {
    #[serde(flatten)]
    card: &'a FoodCard,
    line_calories: Vec<f64>,
}

#[derive(Serialize)]
struct ScheduleView {
    start: String,
    end: String,
    days: Vec<DayPlan>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unprocessable(String),
    ConfirmationRequired {
        message: String,
        preview: CascadePreview,
    },
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::ConfirmationRequired { message, preview } => {
                return (
                    StatusCode::CONFLICT,
                    Json(serde_json::json!({ "error": message, "preview": preview })),
                )
                    .into_response();
            }
            Self::Internal(err) => {
                tracing::error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match plan_error(&err) {
            Some(PlanError::Validation(msg) | PlanError::InvalidInput(msg)) => {
                Self::BadRequest(msg.clone())
            }
            Some(PlanError::DuplicateKey(_) | PlanError::ConfirmationRequired { .. }) => {
                Self::Conflict(err.to_string())
            }
            Some(PlanError::CategoryMismatch { .. }) => Self::Unprocessable(err.to_string()),
            Some(PlanError::NotFound(_)) => Self::NotFound(err.to_string()),
            None => Self::Internal(err),
        }
    }
}

fn parse_date_param(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

fn parse_cell(req: &CellRequest) -> Result<Cell, ApiError> {
    Ok(Cell {
        date: parse_date_param(&req.date)?,
        meal_type: validate_meal_type(&req.meal_type)?,
    })
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Ingredients ---

async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Ingredient>> {
    let svc = state.service();
    let ingredients = svc
        .list_ingredients(query.q.as_deref())
        .into_iter()
        .cloned()
        .collect();
    Json(ingredients)
}

async fn create_ingredient(
    State(state): State<AppState>,
    Json(req): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), ApiError> {
    let mut svc = state.service();
    let ingredient = svc.add_ingredient(&req.name, req.calories_per_unit, &req.unit)?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

async fn delete_ingredient(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut svc = state.service();
    let referenced_by = svc.ingredient_references(&name);
    let deleted = svc.remove_ingredient(&name)?;
    Ok(Json(
        serde_json::json!({ "deleted": deleted, "referenced_by": referenced_by }),
    ))
}

async fn ingredient_references(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<serde_json::Value> {
    let svc = state.service();
    let referenced_by = svc.ingredient_references(&name);
    Json(serde_json::json!({ "ingredient": name, "referenced_by": referenced_by }))
}

// --- Food cards ---

async fn list_cards(
    State(state): State<AppState>,
    Query(query): Query<CardListQuery>,
) -> Result<Json<Vec<FoodCard>>, ApiError> {
    let filter = match query.category.as_deref() {
        Some(c) => c.parse::<CategoryFilter>().map_err(anyhow::Error::from)?,
        None => CategoryFilter::All,
    };
    let svc = state.service();
    let cards = svc
        .filter_cards(filter, query.q.as_deref().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(cards))
}

async fn create_card(
    State(state): State<AppState>,
    Json(draft): Json<CardDraft>,
) -> Result<(StatusCode, Json<FoodCard>), ApiError> {
    let mut svc = state.service();
    let card = svc.create_card(&draft)?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state.service();
    let card = svc.get_card(&id)?;
    let detail = CardDetail {
        card,
        line_calories: svc.line_breakdown(card),
    };
    let value = serde_json::to_value(detail).map_err(anyhow::Error::from)?;
    Ok(Json(value))
}

async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<Json<FoodCard>, ApiError> {
    let draft = CardDraft {
        name: req.name,
        categories: req.categories,
        ingredients: req.ingredients,
    };
    let mut svc = state.service();
    match svc.update_card(&id, &draft, req.confirm) {
        Ok(card) => Ok(Json(card)),
        Err(e) if matches!(plan_error(&e), Some(PlanError::ConfirmationRequired { .. })) => {
            let preview = svc.preview_cascade(&id, &draft.categories)?;
            Err(ApiError::ConfirmationRequired {
                message: e.to_string(),
                preview,
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut svc = state.service();
    let deleted = svc.delete_card(&id)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn preview_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<CascadePreview>, ApiError> {
    let svc = state.service();
    Ok(Json(svc.preview_cascade(&id, &req.categories)?))
}

async fn stale_cards(State(state): State<AppState>) -> Json<Vec<StaleCard>> {
    Json(state.service().stale_cards())
}

async fn slot_cards(
    State(state): State<AppState>,
    Path(meal): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<FoodCard>>, ApiError> {
    let meal_type = validate_meal_type(&meal)?;
    let svc = state.service();
    let cards = svc
        .cards_for_slot(meal_type, query.q.as_deref().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(cards))
}

// --- Schedule ---

async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ScheduleView>, ApiError> {
    let mut svc = state.service();
    let current = svc.range();
    let start = query
        .start
        .as_deref()
        .map(parse_date_param)
        .transpose()?
        .unwrap_or(current.start);
    let end = query
        .end
        .as_deref()
        .map(parse_date_param)
        .transpose()?
        .unwrap_or(current.end);
    let range = DateRange::new(start, end);
    range.validate()?;
    if range != current {
        svc.set_range(range)?;
    }
    let days = range
        .dates()
        .into_iter()
        .map(|d| svc.day_plan(d))
        .collect::<anyhow::Result<_>>()?;
    Ok(Json(ScheduleView {
        start: start.format("%Y-%m-%d").to_string(),
        end: end.format("%Y-%m-%d").to_string(),
        days,
    }))
}

async fn place_entry(
    State(state): State<AppState>,
    Json(req): Json<ScheduleEntryRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let cell = parse_cell(&req.cell)?;
    let mut svc = state.service();
    let inserted = svc.place(cell, &req.food_card_id)?;
    let daily_total = svc.daily_total(cell.date)?;
    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(serde_json::json!({ "inserted": inserted, "daily_total": daily_total })),
    ))
}

async fn remove_entry(
    State(state): State<AppState>,
    Json(req): Json<ScheduleEntryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cell = parse_cell(&req.cell)?;
    let mut svc = state.service();
    let removed = svc.remove_entry(cell, &req.food_card_id)?;
    let daily_total = svc.daily_total(cell.date)?;
    Ok(Json(
        serde_json::json!({ "removed": removed, "daily_total": daily_total }),
    ))
}

async fn move_entry(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = parse_cell(&req.from)?;
    let to = parse_cell(&req.to)?;
    let mut svc = state.service();
    svc.move_entry(&req.food_card_id, from, to)?;
    Ok(Json(
        serde_json::json!({ "from": from.to_string(), "to": to.to_string() }),
    ))
}

async fn get_day_plan(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayPlan>, ApiError> {
    let date = parse_date_param(&date)?;
    let svc = state.service();
    Ok(Json(svc.day_plan(date)?))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/ingredients",
            get(list_ingredients).post(create_ingredient),
        )
        .route(
            "/api/ingredients/{name}",
            axum::routing::delete(delete_ingredient),
        )
        .route(
            "/api/ingredients/{name}/references",
            get(ingredient_references),
        )
        .route("/api/cards", get(list_cards).post(create_card))
        .route("/api/cards/stale", get(stale_cards))
        .route(
            "/api/cards/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/api/cards/{id}/preview", post(preview_card))
        .route("/api/slots/{meal}/cards", get(slot_cards))
        .route(
            "/api/schedule",
            get(get_schedule).post(place_entry).delete(remove_entry),
        )
        .route("/api/schedule/move", post(move_entry))
        .route("/api/schedule/{date}", get(get_day_plan))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: PlanService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head = key.get(..4).unwrap_or_default();
        let tail = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
        eprintln!("API key: {head}...{tail} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
