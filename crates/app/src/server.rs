//! Actix Web server hosting report forms: the embedded page, the JSON form
//! API, an SSE feed of form snapshots and the Prometheus scrape endpoint.
//!
//! Handlers only hold the session lock for synchronous edits. A postal-code
//! lookup records the query, releases the lock for the network round trip and
//! re-acquires it to apply whatever came back.

use std::time::{Duration, Instant};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use serde_json::to_string;
use snapfix_location::{
    GeocodeProvider, LocationConfig, LogSink, NominatimClient, ReportDraft, Resolver,
};
use tracing::{info, warn};

use crate::state::{
    ApiError, AppState, ClickRequest, CoordinatesRequest, GeocodeRequest, SessionLimits,
    SessionResponse, SubmitRequest, ViewRequest,
};

type Data<P> = web::Data<AppState<P>>;

/// Build the Nominatim-backed state and serve until interrupted.
pub(crate) fn run_server(
    config: LocationConfig,
    limits: SessionLimits,
    addr: (&str, u16),
) -> Result<()> {
    let client = NominatimClient::new(&config).context("failed to build geocoder client")?;
    let resolver = Resolver::new(client, config.country.clone());
    let state = web::Data::new(
        AppState::new(config, resolver, Box::new(LogSink)).with_limits(limits),
    );

    actix_web::rt::System::new().block_on(async move {
        actix_web::rt::spawn(sweep_idle_sessions(state.clone()));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(routes::<NominatimClient>)
        })
        .bind(addr)
        .with_context(|| format!("failed to bind {}:{}", addr.0, addr.1))?
        .run();
        info!("listening on http://{}:{}", addr.0, addr.1);
        server.await.context("HTTP server error")
    })
}

/// Periodically drop forms whose page went away without closing them.
async fn sweep_idle_sessions<P: GeocodeProvider>(state: Data<P>) {
    let period = (state.limits().idle_timeout / 4).max(Duration::from_secs(1));
    let mut interval = actix_web::rt::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(err) = state.evict_idle(Instant::now()) {
            warn!("idle session sweep failed: {err}");
        }
    }
}

/// Register every route for a state backed by provider `P`.
pub(crate) fn routes<P>(cfg: &mut web::ServiceConfig)
where
    P: GeocodeProvider + 'static,
{
    cfg.route("/", web::get().to(index_route))
        .route("/metrics", web::get().to(metrics_route))
        .route("/sessions", web::post().to(create_session::<P>))
        .route("/sessions/{id}", web::get().to(get_session::<P>))
        .route("/sessions/{id}", web::delete().to(delete_session::<P>))
        .route(
            "/sessions/{id}/coordinates",
            web::post().to(edit_coordinates::<P>),
        )
        .route("/sessions/{id}/click", web::post().to(click_map::<P>))
        .route("/sessions/{id}/view", web::post().to(change_view::<P>))
        .route(
            "/sessions/{id}/view/settled",
            web::post().to(view_settled::<P>),
        )
        .route("/sessions/{id}/geocode", web::post().to(geocode::<P>))
        .route(
            "/sessions/{id}/notice/ack",
            web::post().to(acknowledge_notice::<P>),
        )
        .route("/sessions/{id}/submit", web::post().to(submit::<P>))
        .route("/sessions/{id}/events", web::get().to(session_events::<P>));
}

/// Serve the report form page.
async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(crate::html::report::REPORT_HTML)
}

/// Prometheus text exposition, or 503 when no recorder is installed.
async fn metrics_route() -> HttpResponse {
    match crate::telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}

async fn create_session<P: GeocodeProvider + 'static>(
    state: Data<P>,
) -> Result<HttpResponse, ApiError> {
    let session = state.open_session()?;
    Ok(HttpResponse::Created().json(session))
}

async fn get_session<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    state.update_session(path.into_inner(), |_| {}).map(web::Json)
}

async fn delete_session<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    state: Data<P>,
) -> Result<HttpResponse, ApiError> {
    state.close_session(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

/// Typed latitude/longitude input.
async fn edit_coordinates<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    body: web::Json<CoordinatesRequest>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    let body = body.into_inner();
    state
        .update_session(path.into_inner(), |form| {
            form.edit_coordinates(body.latitude.as_deref(), body.longitude.as_deref());
        })
        .map(web::Json)
}

/// Click at a container pixel.
async fn click_map<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    body: web::Json<ClickRequest>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    state
        .update_session(path.into_inner(), |form| {
            form.click_map(body.x, body.y);
        })
        .map(web::Json)
}

/// Pan, zoom or resize coming from the user's map gestures.
async fn change_view<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    body: web::Json<ViewRequest>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    let body = body.into_inner();
    state
        .update_session(path.into_inner(), |form| {
            if let (Some(width), Some(height)) = (body.width, body.height) {
                form.resize_map(width, height);
            }
            if let Some(zoom) = body.zoom {
                form.zoom_to(zoom);
            }
            if let Some(center) = body.center {
                form.pan(center);
            } else if body.dx.is_some() || body.dy.is_some() {
                form.pan_by(body.dx.unwrap_or(0.0), body.dy.unwrap_or(0.0));
            }
        })
        .map(web::Json)
}

/// The page finished animating a recenter.
async fn view_settled<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    state
        .update_session(path.into_inner(), |form| form.finish_animation())
        .map(web::Json)
}

/// Resolve a postal code without holding the session lock across the lookup.
async fn geocode<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    body: web::Json<GeocodeRequest>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    let id = path.into_inner();
    let postal_code = body.into_inner().postal_code;
    state.with_session(id, |form| form.edit_postal_code(&postal_code))?;

    let result = state.resolver.resolve(&postal_code).await;

    state
        .update_session(id, |form| {
            if let Some(notice) = form.apply_resolution(result) {
                info!(session = id, postal_code = %postal_code, "{}", notice.message());
            }
        })
        .map(web::Json)
}

async fn acknowledge_notice<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    state: Data<P>,
) -> Result<web::Json<SessionResponse>, ApiError> {
    state
        .update_session(path.into_inner(), |form| {
            form.acknowledge_notice();
        })
        .map(web::Json)
}

/// Hand the finished report to the sink.
async fn submit<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    body: web::Json<SubmitRequest>,
    state: Data<P>,
) -> Result<web::Json<ReportDraft>, ApiError> {
    let id = path.into_inner();
    let body = body.into_inner();
    let draft = state.with_session(id, |form| {
        form.submit(&body.title, &body.category, body.image_name.as_deref())
    })?;
    let draft = draft.inspect_err(|err| warn!(session = id, "report rejected: {err}"))?;
    state.sink.accept(&draft);
    Ok(web::Json(draft))
}

/// Stream form snapshots as Server-Sent Events whenever the revision moves.
async fn session_events<P: GeocodeProvider + 'static>(
    path: web::Path<u64>,
    state: Data<P>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    // Fail fast on unknown ids instead of opening an empty stream.
    state.with_session(id, |_| ())?;

    let state = state.clone();
    let stream = stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 500\n\n"));
        let mut last_revision = None;
        let mut interval = actix_web::rt::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let snapshot = match state.with_session(id, |form| {
                (last_revision != Some(form.revision())).then(|| form.snapshot())
            }) {
                Ok(snapshot) => snapshot,
                Err(_) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"event: closed\ndata: {}\n\n"));
                    break;
                }
            };
            let Some(snapshot) = snapshot else {
                yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                continue;
            };
            last_revision = Some(snapshot.revision);
            let payload = SessionResponse { id, snapshot };
            match to_string(&payload) {
                Ok(json) => {
                    let mut sse_chunk = String::with_capacity(json.len() + 32);
                    sse_chunk.push_str("id: ");
                    sse_chunk.push_str(&payload.snapshot.revision.to_string());
                    sse_chunk.push('\n');
                    sse_chunk.push_str("data: ");
                    sse_chunk.push_str(&json);
                    sse_chunk.push_str("\n\n");
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_chunk));
                }
                Err(err) => {
                    let error_chunk = format!("event: error\ndata: {}\n\n", err);
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(error_chunk));
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};
    use snapfix_location::{GeocodeCandidate, GeocodeError, GeocodeQuery, ReportSink};

    use super::*;

    /// Fixed answers keyed by postal code; `"fail"` simulates an outage.
    #[derive(Default)]
    struct FixedProvider {
        answers: HashMap<&'static str, (&'static str, &'static str)>,
    }

    impl GeocodeProvider for FixedProvider {
        async fn search(&self, query: &GeocodeQuery) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
            if query.postal_code() == "fail" {
                return Err(GeocodeError::Status(502));
            }
            Ok(self
                .answers
                .get(query.postal_code())
                .map(|(lat, lon)| {
                    vec![GeocodeCandidate {
                        lat: lat.to_string(),
                        lon: lon.to_string(),
                        display_name: None,
                    }]
                })
                .unwrap_or_default())
        }
    }

    struct NullSink;

    impl ReportSink for NullSink {
        fn accept(&self, _draft: &ReportDraft) {}
    }

    fn state() -> Data<FixedProvider> {
        let provider = FixedProvider {
            answers: HashMap::from([("110001", ("28.6448", "77.2167"))]),
        };
        web::Data::new(AppState::new(
            LocationConfig::default(),
            Resolver::new(provider, "India"),
            Box::new(NullSink),
        ))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(routes::<FixedProvider>),
            )
            .await
        };
    }

    macro_rules! post_json {
        ($app:expr, $uri:expr, $body:expr $(,)?) => {{
            let req = test::TestRequest::post()
                .uri($uri)
                .set_json($body)
                .to_request();
            let body: Value = test::call_and_read_body_json(&$app, req).await;
            body
        }};
    }

    #[actix_web::test]
    async fn index_serves_the_report_page() {
        let state = state();
        let app = app!(state);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("SnapFix"));
    }

    #[actix_web::test]
    async fn create_session_returns_default_form() {
        let state = state();
        let app = app!(state);
        let resp =
            test::call_service(&app, test::TestRequest::post().uri("/sessions").to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["coordinates"]["lat_text"], "28.6139");
        assert_eq!(body["map"]["view"]["phase"], "idle");
        assert_eq!(body["map"]["attribution"], "\u{a9} OpenStreetMap contributors");
        assert_eq!(state.session_count(), 1);
    }

    #[actix_web::test]
    async fn geocode_updates_coordinates_and_recenters() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        let body = post_json!(app, "/sessions/1/geocode", json!({"postal_code": "110001"}));
        assert_eq!(body["postal_code"], "110001");
        assert_eq!(body["coordinates"]["lat_text"], "28.6448");
        assert_eq!(body["coordinates"]["lng_text"], "77.2167");
        assert_eq!(body["map"]["view"]["phase"], "recentering");
        assert!(body["notice"].is_null());

        let body = post_json!(app, "/sessions/1/view/settled", json!(null));
        assert_eq!(body["map"]["view"]["phase"], "idle");
    }

    #[actix_web::test]
    async fn geocode_miss_and_outage_raise_notices() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        let body = post_json!(app, "/sessions/1/geocode", json!({"postal_code": "000000"}));
        assert_eq!(body["notice"]["kind"], "not_found");
        assert_eq!(body["notice"]["message"], "No location found");
        assert_eq!(body["coordinates"]["lat_text"], "28.6139");

        let body = post_json!(app, "/sessions/1/notice/ack", json!(null));
        assert!(body["notice"].is_null());

        let body = post_json!(app, "/sessions/1/geocode", json!({"postal_code": "fail"}));
        assert_eq!(body["notice"]["kind"], "lookup_failed");
        assert_eq!(body["coordinates"]["lat_text"], "28.6139");
    }

    #[actix_web::test]
    async fn click_writes_rounded_text_without_recentering() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        let body = post_json!(app, "/sessions/1/click", json!({"x": 400.0, "y": 300.0}));
        assert_eq!(body["coordinates"]["lat_text"], "28.613900");
        assert_eq!(body["coordinates"]["lng_text"], "77.209000");
        assert_eq!(body["map"]["view"]["phase"], "idle");
    }

    #[actix_web::test]
    async fn invalid_text_renders_without_marker() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        let body = post_json!(
            app,
            "/sessions/1/coordinates",
            json!({"latitude": "", "longitude": "abc"}),
        );
        assert!(body["coordinates"]["lat"].is_null());
        assert!(body["map"]["marker"].is_null());
        assert_eq!(body["map"]["viewport"]["center"]["lat"], 28.6139);
    }

    #[actix_web::test]
    async fn pan_diverges_the_view() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        // Dragging right and up reveals the west and the south.
        let body = post_json!(app, "/sessions/1/view", json!({"dx": 40.0, "dy": -10.0}));
        assert_eq!(body["map"]["view"]["phase"], "diverged");
        let center = &body["map"]["viewport"]["center"];
        assert!(center["lng"].as_f64().unwrap() < 77.209);
        assert!(center["lat"].as_f64().unwrap() < 28.6139);
        let body = post_json!(app, "/sessions/1/view", json!({"zoom": 15}));
        assert_eq!(body["map"]["viewport"]["zoom"], 15);
    }

    #[actix_web::test]
    async fn submit_returns_the_draft_or_422() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));

        let body = post_json!(
            app,
            "/sessions/1/submit",
            json!({"title": "Open manhole", "category": "manhole", "image_name": "hole.png"}),
        );
        assert_eq!(body["category"], "manhole");
        assert_eq!(body["latitude"], 28.6139);
        assert_eq!(body["image_name"], "hole.png");

        let req = test::TestRequest::post()
            .uri("/sessions/1/submit")
            .set_json(json!({"title": "x", "category": "bridge"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn unknown_session_is_404() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::get().uri("/sessions/42").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "no report form with id 42");

        let req = test::TestRequest::get().uri("/sessions/42/events").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn delete_closes_the_session() {
        let state = state();
        let app = app!(state);
        post_json!(app, "/sessions", json!(null));
        let req = test::TestRequest::delete().uri("/sessions/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.session_count(), 0);
    }
}
