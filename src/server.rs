//! HTTP/1.1 front end for the search coordinator
use crate::error::{LogSearchError, Result};
use crate::search::{MatchMode, SearchCoordinator, SearchCriteria, SearchOutcome, TimeWindow};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Largest accepted `POST /search` body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    pub folders: Vec<String>,
}

/// Accept connections on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<SearchCoordinator>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                match accept {
                    Ok((stream, peer)) => {
                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let svc = service_fn(move |req| {
                                let coordinator = coordinator.clone();
                                async move { handle_request(req, &coordinator).await }
                            });

                            if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                                if !e.is_incomplete_message() {
                                    warn!("Connection error from {peer}: {e}");
                                }
                            }
                        });
                    }
                    Err(e) => error!("Accept failed: {e}"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutting down");
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    coordinator: &SearchCoordinator,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    debug!("{} {}", req.method(), req.uri().path());

    match (req.method(), req.uri().path()) {
        (&Method::POST, "/search") => search(req, coordinator).await,
        (&Method::GET, "/metrics") => Ok(text(StatusCode::OK, coordinator.metrics().gather())),
        (&Method::GET, "/health") => Ok(text(StatusCode::OK, "ok")),
        (method, path) => Ok(text(
            StatusCode::NOT_FOUND,
            format!("no route for {method} {path}\n"),
        )),
    }
}

async fn search(
    req: Request<Incoming>,
    coordinator: &SearchCoordinator,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let body = match read_body(req.into_body()).await {
        Ok(body) => body,
        Err(message) => return Ok(text(StatusCode::BAD_REQUEST, message)),
    };
    let request: SearchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Ok(text(
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {e}\n"),
            ));
        }
    };

    // hyper drops this future when the client goes away, which cancels the search.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match run_search(&request, coordinator, &cancel).await {
        Ok(outcome) => {
            let mut body = String::new();
            for line in &outcome.lines {
                body.push_str(line);
                body.push('\n');
            }
            Ok(text(StatusCode::OK, body))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// Collect a request body of at most [`MAX_BODY_BYTES`].
async fn read_body<B>(body: B) -> std::result::Result<Bytes, String>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => Err(format!("invalid request body: {e}\n")),
    }
}

async fn run_search(
    request: &SearchRequest,
    coordinator: &SearchCoordinator,
    cancel: &CancellationToken,
) -> Result<SearchOutcome> {
    let window = TimeWindow::from_bounds(coordinator.codec(), &request.start, &request.end)?;
    let mode = if request.is_regex {
        MatchMode::Regex
    } else {
        MatchMode::Literal
    };
    let criteria = SearchCriteria::new(&request.pattern, mode)?;
    coordinator
        .execute_search(&request.folders, window, &criteria, cancel)
        .await
}

fn error_response(err: &LogSearchError) -> Response<Full<Bytes>> {
    if err.is_client_error() {
        return text(StatusCode::BAD_REQUEST, format!("{err}\n"));
    }

    warn!("Search failed: {err}");
    match err {
        LogSearchError::FileSetChanged { .. } => text(
            StatusCode::INTERNAL_SERVER_ERROR,
            "file set changed during search\n",
        ),
        _ => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{err}\n")),
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
