use std::sync::Arc;

use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    auth::Session,
    error::AppError,
    models::{
        filter::{DateRange, SortConfig, SortDirection, SortField},
        trip::{Trip, TripDetail},
    },
    services::dashboard::{DashboardView, FetchMode},
    state::AppState,
    view::{Action, ViewState},
};

const FLASH_COOKIE: &str = "trip_flash";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/trips.json", get(trips_json))
        .route("/refresh", post(refresh))
        .route("/auto-refresh", post(auto_refresh))
        .route("/filters", post(apply_filters))
        .route("/filters/clear", post(clear_filters))
        .route("/sort/:field", get(sort_by))
        .route("/trips/:id/force-payment", post(force_payment))
}

/// First authenticated request for a session mounts its view and starts
/// loading the trip list; that first page shows the loading indicator.
async fn mounted_view(state: &AppState, session: &Session) -> Result<Arc<DashboardView>, AppError> {
    let view_id = session.require_view_id()?;
    let (view, fresh) = state.sessions.mount(view_id);
    view.touch();
    if fresh {
        view.dispatch(Action::Authenticated).await;
        view.spawn_fetch(FetchMode::Loud).await;
    }
    Ok(view)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Flash {
    ok: bool,
    message: String,
}

fn with_flash(jar: PrivateCookieJar, ok: bool, message: String) -> PrivateCookieJar {
    let payload = serde_json::to_string(&Flash { ok, message }).unwrap_or_default();
    jar.add(Cookie::build((FLASH_COOKIE, payload)).path("/").http_only(true).build())
}

fn take_flash(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<Flash>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| serde_json::from_str::<Flash>(cookie.value()).ok());
    if flash.is_some() {
        (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
    } else {
        (jar, None)
    }
}

#[derive(Clone)]
struct DetailCell {
    present: bool,
    amount: String,
    time: String,
    location: String,
    status: String,
    tone: &'static str,
}

#[derive(Clone)]
struct TripRow {
    id: i64,
    created_at: String,
    masked_cpan: String,
    tarif: String,
    tap_in: DetailCell,
    tap_out: DetailCell,
    status: String,
    status_tone: &'static str,
    can_force_payment: bool,
}

#[derive(Clone)]
struct SortHeader {
    field: &'static str,
    label: &'static str,
    indicator: &'static str,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    rows: Vec<TripRow>,
    headers: Vec<SortHeader>,
    record_count: usize,
    initial_loading: bool,
    show_last_updated: bool,
    last_updated: String,
    show_error: bool,
    error_message: String,
    show_notice: bool,
    notice_ok: bool,
    notice_message: String,
    search: String,
    date_from: String,
    date_to: String,
    range_summary: String,
    auto_refresh: bool,
    refresh_secs: u64,
    loading_recheck_secs: u64,
    empty_message: String,
}

const LOADING_RECHECK_SECS: u64 = 1;

async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let view = mounted_view(&state, &session).await?;
    let (jar, flash) = take_flash(jar);
    let refresh_secs = view.poll_interval().as_secs().max(1);
    let api_base = state.config.api.base_url.as_str().trim_end_matches('/');
    let template = {
        let current = view.read().await;
        render(&current, flash, refresh_secs, api_base)
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

fn render(
    state: &ViewState,
    flash: Option<Flash>,
    refresh_secs: u64,
    api_base: &str,
) -> DashboardTemplate {
    let visible = state.visible();
    let rows: Vec<TripRow> = visible.iter().map(|trip| trip_row(trip)).collect();
    let empty_message = if !state.initial_loading && rows.is_empty() && state.error.is_none() {
        if state.trips.is_empty() {
            "No trip data available".to_string()
        } else {
            "No results match your filters".to_string()
        }
    } else {
        String::new()
    };
    let (show_notice, notice_ok, notice_message) = match flash {
        Some(flash) => (true, flash.ok, flash.message),
        None => (false, false, String::new()),
    };

    DashboardTemplate {
        record_count: rows.len(),
        rows,
        headers: sort_headers(state.sort),
        initial_loading: state.initial_loading,
        show_last_updated: state.error.is_none() && state.last_refresh.is_some(),
        last_updated: state.last_refresh.map(format_datetime).unwrap_or_default(),
        show_error: state.error.is_some(),
        error_message: state
            .error
            .as_deref()
            .map(|error| format!("{error}. Please check if the API server is running on {api_base}"))
            .unwrap_or_default(),
        show_notice,
        notice_ok,
        notice_message,
        search: state.search.clone(),
        date_from: input_date(state.date_range.from),
        date_to: input_date(state.date_range.to),
        range_summary: range_summary(&state.date_range),
        auto_refresh: state.auto_refresh,
        refresh_secs,
        loading_recheck_secs: LOADING_RECHECK_SECS,
        empty_message,
    }
}

fn trip_row(trip: &Trip) -> TripRow {
    TripRow {
        id: trip.id,
        created_at: format_datetime(trip.created_at),
        masked_cpan: trip.masked_cpan(),
        tarif: format_currency(trip.final_amount()),
        tap_in: detail_cell(trip.tap_in()),
        tap_out: detail_cell(trip.tap_out()),
        status: trip.status.clone(),
        status_tone: trip_tone(&trip.status),
        can_force_payment: trip.can_force_payment(),
    }
}

fn detail_cell(detail: Option<&TripDetail>) -> DetailCell {
    match detail {
        Some(detail) => DetailCell {
            present: true,
            amount: format_currency(detail.amount),
            time: detail.recorded_at().map(format_time).unwrap_or_default(),
            location: detail.location_label(),
            status: detail.status.clone(),
            tone: detail_tone(&detail.status),
        },
        None => DetailCell {
            present: false,
            amount: String::new(),
            time: String::new(),
            location: String::new(),
            status: String::new(),
            tone: "muted",
        },
    }
}

fn detail_tone(status: &str) -> &'static str {
    match status {
        "SUCCESS" => "success",
        "INIT" => "warning",
        _ => "danger",
    }
}

fn trip_tone(status: &str) -> &'static str {
    match status {
        "COMPLETE" => "success",
        "PENDING" => "warning",
        _ => "danger",
    }
}

fn sort_headers(sort: SortConfig) -> Vec<SortHeader> {
    [
        (SortField::CreatedAt, "Created At"),
        (SortField::UserCpan, "User CPAN"),
        (SortField::FinalAmount, "Tarif"),
    ]
    .into_iter()
    .map(|(field, label)| SortHeader {
        field: field.as_str(),
        label,
        indicator: match (sort.field == field, sort.direction) {
            (false, _) => "↕",
            (true, SortDirection::Asc) => "▲",
            (true, SortDirection::Desc) => "▼",
        },
    })
    .collect()
}

async fn trips_json(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Trip>>, AppError> {
    let view = mounted_view(&state, &session).await?;
    let current = view.read().await;
    let trips = current.visible().into_iter().cloned().collect();
    Ok(Json(trips))
}

async fn refresh(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    let view = mounted_view(&state, &session).await?;
    view.spawn_fetch(FetchMode::Loud).await;
    Ok(Redirect::to("/dashboard"))
}

#[derive(Deserialize)]
struct AutoRefreshForm {
    enabled: Option<String>,
}

async fn auto_refresh(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AutoRefreshForm>,
) -> Result<Redirect, AppError> {
    let view = mounted_view(&state, &session).await?;
    view.set_auto_refresh(form.enabled.is_some()).await;
    Ok(Redirect::to("/dashboard"))
}

#[derive(Deserialize)]
struct FilterForm {
    #[serde(default)]
    search: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
}

async fn apply_filters(
    State(state): State<AppState>,
    session: Session,
    jar: PrivateCookieJar,
    Form(form): Form<FilterForm>,
) -> Result<Response, AppError> {
    let view = mounted_view(&state, &session).await?;
    let range = match parse_range(&form.from, &form.to) {
        Ok(range) => range,
        Err(message) => {
            return Ok((with_flash(jar, false, message), Redirect::to("/dashboard")).into_response())
        }
    };
    view.dispatch(Action::SetSearch(form.search)).await;
    view.dispatch(Action::SetDateFrom(range.from)).await;
    view.dispatch(Action::SetDateTo(range.to)).await;
    Ok(Redirect::to("/dashboard").into_response())
}

async fn clear_filters(
    State(state): State<AppState>,
    session: Session,
) -> Result<Redirect, AppError> {
    let view = mounted_view(&state, &session).await?;
    view.dispatch(Action::ClearFilters).await;
    Ok(Redirect::to("/dashboard"))
}

async fn sort_by(
    State(state): State<AppState>,
    session: Session,
    Path(field): Path<String>,
) -> Result<Redirect, AppError> {
    let view = mounted_view(&state, &session).await?;
    let field: SortField = field.parse().map_err(AppError::BadRequest)?;
    view.dispatch(Action::SortBy(field)).await;
    Ok(Redirect::to("/dashboard"))
}

async fn force_payment(
    State(state): State<AppState>,
    session: Session,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let view = mounted_view(&state, &session).await?;
    let eligible = {
        let current = view.read().await;
        current
            .trips
            .iter()
            .find(|trip| trip.id == trip_id)
            .map(Trip::can_force_payment)
    };
    let jar = match eligible {
        Some(true) => match view.force_payment(trip_id).await {
            Ok(message) => with_flash(jar, true, message),
            Err(message) => with_flash(jar, false, message),
        },
        Some(false) => {
            warn!(trip_id, "force payment refused for settled trip");
            with_flash(
                jar,
                false,
                format!("Trip {trip_id} is not eligible for Force Payment"),
            )
        }
        None => with_flash(jar, false, format!("Trip {trip_id} not found")),
    };
    Ok((jar, Redirect::to("/dashboard")))
}

fn parse_range(from: &str, to: &str) -> Result<DateRange, String> {
    let from = parse_input_date(from)?;
    let to = parse_input_date(to)?;
    if let (Some(from), Some(to)) = (from, to) {
        if to < from {
            return Err("End date cannot be before start date".into());
        }
    }
    Ok(DateRange::new(from, to))
}

fn parse_input_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("Invalid date: {raw}"))
}

fn input_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn range_summary(range: &DateRange) -> String {
    match (range.from, range.to) {
        (Some(from), Some(to)) => format!(
            "Showing data from {} to {}",
            format_date(from),
            format_date(to)
        ),
        (Some(from), None) => format!("Showing data from {} onwards", format_date(from)),
        (None, Some(to)) => format!("Showing data up to {}", format_date(to)),
        (None, None) => String::new(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Rupiah in the `id-ID` style: `Rp 12.345`, decimals only when present.
fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    match fraction {
        0 => format!("{sign}Rp {grouped}"),
        f if f % 10 == 0 => format!("{sign}Rp {grouped},{}", f / 10),
        f => format!("{sign}Rp {grouped},{f:02}"),
    }
}
