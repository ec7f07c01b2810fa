//! Shared server state and the JSON bodies exchanged with the report page.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use snapfix_location::{
    FormSnapshot, GeocodeProvider, LatLng, LocationConfig, LocationForm, ReportSink, Resolver,
    SubmitError,
};
use thiserror::Error;
use tracing::info;

/// How long a form may sit untouched, and how many may be open at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SessionLimits {
    pub(crate) idle_timeout: Duration,
    pub(crate) max_open: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            max_open: 10_000,
        }
    }
}

struct OpenForm {
    form: LocationForm,
    touched: Instant,
}

/// Open report forms keyed by session id.
pub(crate) struct AppState<P> {
    pub(crate) config: LocationConfig,
    pub(crate) resolver: Resolver<P>,
    pub(crate) sink: Box<dyn ReportSink + Send + Sync>,
    limits: SessionLimits,
    sessions: Mutex<HashMap<u64, OpenForm>>,
    next_id: AtomicU64,
}

impl<P: GeocodeProvider> AppState<P> {
    pub(crate) fn new(
        config: LocationConfig,
        resolver: Resolver<P>,
        sink: Box<dyn ReportSink + Send + Sync>,
    ) -> Self {
        Self {
            config,
            resolver,
            sink,
            limits: SessionLimits::default(),
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub(crate) fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Open a form, first dropping idle ones and, at capacity, the least
    /// recently used.
    pub(crate) fn open_session(&self) -> Result<SessionResponse, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let form = LocationForm::new(&self.config);
        let snapshot = form.snapshot();
        let now = Instant::now();

        let mut sessions = self.sessions.lock().map_err(|_| ApiError::Poisoned)?;
        let mut evicted = drop_idle(&mut sessions, now, self.limits.idle_timeout);
        while sessions.len() >= self.limits.max_open.max(1) {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(key, open)| (open.touched, **key))
                .map(|(key, _)| *key)
            else {
                break;
            };
            sessions.remove(&oldest);
            evicted += 1;
        }
        sessions.insert(
            id,
            OpenForm {
                form,
                touched: now,
            },
        );
        let open = sessions.len();
        drop(sessions);

        record_evictions(evicted);
        info!(session = id, open, "report form opened");
        Ok(SessionResponse { id, snapshot })
    }

    /// Drop forms untouched since `now - idle_timeout`. Returns how many went.
    pub(crate) fn evict_idle(&self, now: Instant) -> Result<usize, ApiError> {
        let mut sessions = self.sessions.lock().map_err(|_| ApiError::Poisoned)?;
        let evicted = drop_idle(&mut sessions, now, self.limits.idle_timeout);
        drop(sessions);
        record_evictions(evicted);
        Ok(evicted)
    }

    pub(crate) fn close_session(&self, id: u64) -> Result<(), ApiError> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::Poisoned)?
            .remove(&id)
            .map(|_| info!(session = id, "report form closed"))
            .ok_or(ApiError::UnknownSession(id))
    }

    /// Run `f` against one form while holding the session lock.
    pub(crate) fn with_session<R>(
        &self,
        id: u64,
        f: impl FnOnce(&mut LocationForm) -> R,
    ) -> Result<R, ApiError> {
        let mut sessions = self.sessions.lock().map_err(|_| ApiError::Poisoned)?;
        let open = sessions.get_mut(&id).ok_or(ApiError::UnknownSession(id))?;
        open.touched = Instant::now();
        Ok(f(&mut open.form))
    }

    /// Apply `f` and answer with the resulting snapshot.
    pub(crate) fn update_session(
        &self,
        id: u64,
        f: impl FnOnce(&mut LocationForm),
    ) -> Result<SessionResponse, ApiError> {
        self.with_session(id, |form| {
            f(form);
            SessionResponse {
                id,
                snapshot: form.snapshot(),
            }
        })
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

fn drop_idle(sessions: &mut HashMap<u64, OpenForm>, now: Instant, idle_timeout: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, open| now.saturating_duration_since(open.touched) < idle_timeout);
    before - sessions.len()
}

fn record_evictions(evicted: usize) {
    if evicted > 0 {
        metrics::counter!("snapfix_sessions_evicted_total").increment(evicted as u64);
        info!(evicted, "evicted stale report forms");
    }
}

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("no report form with id {0}")]
    UnknownSession(u64),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error("session store is unavailable")]
    Poisoned,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownSession(_) => StatusCode::NOT_FOUND,
            ApiError::Submit(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) id: u64,
    #[serde(flatten)]
    pub(crate) snapshot: FormSnapshot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoordinatesRequest {
    pub(crate) latitude: Option<String>,
    pub(crate) longitude: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClickRequest {
    pub(crate) x: f64,
    pub(crate) y: f64,
}

/// User pan/zoom gesture or container resize.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ViewRequest {
    pub(crate) center: Option<LatLng>,
    pub(crate) dx: Option<f64>,
    pub(crate) dy: Option<f64>,
    pub(crate) zoom: Option<u8>,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeRequest {
    pub(crate) postal_code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) image_name: Option<String>,
}
