//! Timetable ingestion and venue-conflict scheduling server.

mod conflict;
mod error;
mod expander;
mod pipeline;
mod registry;
mod row_validator;
mod service;
mod sheet_parser;
mod store;
mod types;
mod week_range;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use error::SchedulingError;
use registry::{RegistryStore, TeacherRecord, VenueRecord};
use service::{CommitOutcome, TimetableService};
use std::sync::Arc;
use store::InMemoryScheduleRepository;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::{DayOfWeek, TermWindow, TimetableEntry, WeekScope};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<TimetableService>,
    registry: Arc<RegistryStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetable_ingest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load registries from filesystem
    let registry_dir = std::env::var("REGISTRY_DIR").unwrap_or_else(|_| "registry".to_string());
    let registry = match RegistryStore::load_from_dir(std::path::Path::new(&registry_dir)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Starting with empty registries: {}", e);
            Arc::new(RegistryStore::empty())
        }
    };

    // Build application state
    let repo = Arc::new(InMemoryScheduleRepository::new());
    let service = Arc::new(TimetableService::new(Arc::clone(&registry), repo));
    let state = AppState { service, registry };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/registry/teachers", get(list_teachers))
        .route("/registry/venues", get(list_venues))
        .route("/timetable/preview", post(preview_timetable))
        .route("/timetable/commit", post(commit_timetable))
        .route("/timetable/:department", get(department_timetable))
        .route("/timetable/entries/:id/venue", post(assign_venue))
        .route("/venues/available", get(available_venues))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024)) // 25MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Run server
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn list_teachers(State(state): State<AppState>) -> Json<Vec<TeacherRecord>> {
    Json(state.registry.teachers())
}

async fn list_venues(State(state): State<AppState>) -> Json<Vec<VenueRecord>> {
    Json(state.registry.venues())
}

#[derive(serde::Deserialize)]
struct TermQuery {
    term_start: NaiveDate,
    term_end: NaiveDate,
}

/// Upload a workbook and dry-run the pipeline. Nothing is persisted.
async fn preview_timetable(
    State(state): State<AppState>,
    Query(query): Query<TermQuery>,
    mut multipart: Multipart,
) -> Result<Json<pipeline::PreviewSummary>, (StatusCode, String)> {
    let term = TermWindow::new(query.term_start, query.term_end).map_err(reject)?;
    let (filename, data) = read_upload(&mut multipart).await?;
    info!("Previewing '{}' ({} bytes)", filename, data.len());

    state
        .service
        .preview(&filename, &data, &term)
        .await
        .map(Json)
        .map_err(reject)
}

#[derive(serde::Deserialize)]
struct CommitQuery {
    department: String,
    term_start: NaiveDate,
    term_end: NaiveDate,
    #[serde(default)]
    allow_errors: bool,
}

/// Upload a workbook and atomically replace the department's timetable
/// for the term. Rejected while error rows remain unless
/// `allow_errors=true` is passed explicitly.
async fn commit_timetable(
    State(state): State<AppState>,
    Query(query): Query<CommitQuery>,
    mut multipart: Multipart,
) -> Result<Json<CommitOutcome>, (StatusCode, String)> {
    let term = TermWindow::new(query.term_start, query.term_end).map_err(reject)?;
    let (filename, data) = read_upload(&mut multipart).await?;
    info!(
        "Committing '{}' ({} bytes) for department '{}'",
        filename,
        data.len(),
        query.department
    );

    state
        .service
        .commit(&filename, &data, &query.department, &term, query.allow_errors)
        .await
        .map(Json)
        .map_err(reject)
}

#[derive(serde::Deserialize)]
struct DepartmentQuery {
    term_start: NaiveDate,
}

/// Committed entries for a department/term.
async fn department_timetable(
    State(state): State<AppState>,
    Path(department): Path<String>,
    Query(query): Query<DepartmentQuery>,
) -> Json<Vec<TimetableEntry>> {
    Json(
        state
            .service
            .entries_for(&department, query.term_start)
            .await,
    )
}

#[derive(serde::Deserialize)]
struct AvailabilityQuery {
    day: String,
    start: String,
    end: String,
    /// Monday of the week to check. Absent = term-wide.
    week: Option<NaiveDate>,
}

/// Venues free for a day/time window, per week or term-wide.
async fn available_venues(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let day = DayOfWeek::parse(&query.day).ok_or((
        StatusCode::BAD_REQUEST,
        format!("'{}' is not a day of the week", query.day),
    ))?;
    let start = parse_query_time(&query.start)?;
    let end = parse_query_time(&query.end)?;
    if end <= start {
        return Err((
            StatusCode::BAD_REQUEST,
            "end must be after start".to_string(),
        ));
    }
    let scope = query.week.map(WeekScope::Week).unwrap_or(WeekScope::Term);

    Ok(Json(state.service.available_venues(day, start, end, scope).await))
}

#[derive(serde::Deserialize)]
struct AssignBody {
    venue_id: String,
}

/// Bind a venue to a committed entry. 409 when the slot is taken.
async fn assign_venue(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<TimetableEntry>, (StatusCode, String)> {
    state
        .service
        .assign_venue(&entry_id, &body.venue_id)
        .await
        .map(Json)
        .map_err(reject)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Read the uploaded file out of a multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), (StatusCode, String)> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("upload.xlsx").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e)))?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    Ok((filename, file_data))
}

fn parse_query_time(value: &str) -> Result<NaiveTime, (StatusCode, String)> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a valid HH:MM time", value),
        )
    })
}

fn reject(e: SchedulingError) -> (StatusCode, String) {
    (e.status(), e.to_string())
}
