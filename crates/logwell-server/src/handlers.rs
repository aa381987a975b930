//! HTTP request handlers for the four query surfaces.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use logwell_model::{format_record, parse_instant, LogFilter, Record};
use logwell_reader::ParseMode;

use crate::error::{ServerError, ServerResult};
use crate::render;
use crate::state::AppState;

/// Buffer between the reader task and the response stream.
const STREAM_CHANNEL: usize = 64;

/// Query parameters common to every log surface.
#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    /// Shared secret.
    pub pwd: Option<String>,
    /// Earliest instant (inclusive), in the instant grammar.
    pub from: Option<String>,
    /// Latest instant (inclusive), in the instant grammar.
    pub to: Option<String>,
    /// Comma-separated level keywords.
    pub level: Option<String>,
    /// Comma-separated module keywords.
    pub module: Option<String>,
    /// Maximum records to return (positive).
    pub limit: Option<usize>,
    /// Records to skip (bulk surfaces only).
    pub offset: Option<usize>,
}

impl LogParams {
    /// Builds a filter from the parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an unparseable instant or a zero limit.
    pub fn to_filter(&self) -> ServerResult<LogFilter> {
        let mut filter = LogFilter::new();

        if let Some(from) = &self.from {
            filter.from = Some(parse_instant(from).ok_or_else(|| {
                ServerError::InvalidRequest(format!("unparseable `from` instant: {from}"))
            })?);
        }
        if let Some(to) = &self.to {
            filter.to = Some(parse_instant(to).ok_or_else(|| {
                ServerError::InvalidRequest(format!("unparseable `to` instant: {to}"))
            })?);
        }
        if let Some(level) = &self.level {
            filter.levels = split_keywords(level)
                .map(|k| k.to_ascii_lowercase())
                .collect();
        }
        if let Some(module) = &self.module {
            filter.modules = split_keywords(module).map(str::to_string).collect();
        }
        match self.limit {
            Some(0) => {
                return Err(ServerError::InvalidRequest(
                    "`limit` must be positive".to_string(),
                ))
            }
            limit => filter.limit = limit,
        }
        filter.offset = self.offset.unwrap_or(0);

        Ok(filter)
    }
}

fn split_keywords(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|k| !k.is_empty())
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Crate version.
    pub version: String,
}

/// Handle GET /api/health - unauthenticated liveness probe.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Bulk JSON response body.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// The matching records after `offset`/`limit` slicing.
    pub logs: Vec<Record>,
    /// Number of records in `logs`.
    pub count: usize,
    /// Total matches before slicing.
    pub total: usize,
    /// Whether more matches exist past this page.
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Runs the permissive reader to completion and slices the result.
async fn collect_page(
    state: &AppState,
    params: &LogParams,
) -> ServerResult<(Vec<Record>, usize, usize)> {
    let mut filter = params.to_filter()?;
    let offset = filter.offset;
    let limit = filter.limit;
    // The reader runs unbounded so `total` counts every match; paging is
    // applied to the collected result.
    filter.limit = None;
    filter.offset = 0;

    let matches = state.reader().collect(&filter, ParseMode::Permissive).await?;
    let total = matches.len();
    let page: Vec<Record> = matches
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    Ok((page, total, offset))
}

/// Handle GET /api/logs - bulk JSON.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> ServerResult<Json<LogsResponse>> {
    state.authorize(params.pwd.as_deref())?;

    let (logs, total, offset) = collect_page(&state, &params).await?;
    let count = logs.len();
    Ok(Json(LogsResponse {
        logs,
        count,
        total,
        has_more: offset + count < total,
    }))
}

/// Handle GET /api/logs/raw - plain text export.
pub async fn get_logs_raw(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> ServerResult<Response> {
    state.authorize(params.pwd.as_deref())?;

    let (logs, total, offset) = collect_page(&state, &params).await?;
    let count = logs.len();
    let has_more = offset + count < total;

    let mut body = String::new();
    body.push_str("# logwell raw export\n");
    body.push_str(&format!("# total: {total}\n"));
    body.push_str(&format!("# count: {count}\n"));
    body.push_str(&format!("# offset: {offset}\n"));
    body.push_str(&format!("# hasMore: {has_more}\n"));
    body.push('\n');
    for record in &logs {
        body.push_str(&format_record(record));
        body.push('\n');
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Handle GET /api/logs/stream - SSE: historical prefix, sentinel, live tail.
pub async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.authorize(params.pwd.as_deref())?;
    let filter = params.to_filter()?;
    let follow = filter.limit.is_none();

    // Fail before headers while that is still possible; mid-stream errors
    // can only close the connection.
    if tokio::fs::metadata(state.reader().path()).await.is_err() {
        return Err(ServerError::LogFileMissing(
            state.reader().path().to_path_buf(),
        ));
    }

    // Subscribe before the historical read so appends racing the scan land
    // in the broadcast buffer instead of a gap.
    let mut live_filter = filter.clone();
    live_filter.limit = None;
    live_filter.offset = 0;
    let live_rx = state.tailer().subscribe(live_filter);

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL);
    let reader = state.reader().clone();
    let historical_filter = filter.clone();
    let failed = Arc::new(AtomicBool::new(false));
    let failed_flag = Arc::clone(&failed);
    tokio::spawn(async move {
        if let Err(e) = reader
            .stream(&historical_filter, ParseMode::Strict, tx)
            .await
        {
            // Flag before the channel closes so the sentinel sees it.
            failed_flag.store(true, Ordering::Relaxed);
            error!(error = %e, "historical stream failed");
        }
    });

    let sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sent);
    let historical = ReceiverStream::new(rx).filter_map(move |record| {
        let counter = Arc::clone(&counter);
        async move {
            match serde_json::to_string(&record) {
                Ok(json) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Some(Ok(Event::default().data(json)))
                }
                Err(_) => None,
            }
        }
    });

    // Polled only after the historical stream is exhausted, so it reads the
    // final count.
    let sentinel = stream::once(async move {
        let count = sent.load(Ordering::Relaxed);
        Ok(Event::default().event("historical-end").data(count.to_string()))
    });

    let live: futures::stream::BoxStream<'static, Result<Event, Infallible>> = if follow {
        live_rx
            .filter_map(|record| async move {
                match serde_json::to_string(&record) {
                    Ok(json) => Some(Ok(Event::default().data(json))),
                    Err(_) => None,
                }
            })
            .boxed()
    } else {
        // With a limit the stream closes after the sentinel; clients treat
        // this as a normal end of data.
        stream::empty().boxed()
    };

    // An I/O failure mid-read closes the stream with no final event.
    let events = historical
        .chain(sentinel)
        .chain(live)
        .take_while(move |_| {
            let failed = Arc::clone(&failed);
            async move { !failed.load(Ordering::Relaxed) }
        });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Handle GET / - the streaming HTML page.
///
/// Auth failures render the static login page rather than a JSON error; an
/// unconfigured secret still fails closed with a 500.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> Response {
    match state.authorize(params.pwd.as_deref()) {
        Ok(()) => {}
        Err(ServerError::Unauthorized) => {
            return Html(render::login_page()).into_response();
        }
        Err(err) => return err.into_response(),
    }

    let filter = match params.to_filter() {
        Ok(filter) => filter,
        Err(err) => return err.into_response(),
    };

    if tokio::fs::metadata(state.reader().path()).await.is_err() {
        return ServerError::LogFileMissing(state.reader().path().to_path_buf()).into_response();
    }

    let started = Instant::now();
    let shell = state.shell().clone();
    let secret = params.pwd.clone().unwrap_or_default();

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL);
    let reader = state.reader().clone();
    tokio::spawn(async move {
        if let Err(e) = reader.stream(&filter, ParseMode::Strict, tx).await {
            error!(error = %e, "page stream failed");
        }
    });

    let rows_sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rows_sent);

    let prelude = stream::once(async move {
        Ok::<_, Infallible>(Bytes::from(render::document_prelude() + &shell.before_logs))
    });
    let rows = ReceiverStream::new(rx).map(move |record| {
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(Bytes::from(render::render_row(&record)))
    });
    let tail = {
        let shell = state.shell().clone();
        stream::once(async move {
            let count = rows_sent.load(Ordering::Relaxed);
            let elapsed = started.elapsed().as_millis();
            let mut end = shell.after_logs.clone();
            end.push_str(&format!("<!-- {count} rows in {elapsed}ms -->\n"));
            end.push_str(&render::hydration_script(&secret, count));
            Ok(Bytes::from(end))
        })
    };

    let body = Body::from_stream(prelude.chain(rows).chain(tail));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
