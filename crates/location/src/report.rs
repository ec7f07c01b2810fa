//! Issue report assembled from the form at submit time, and the hand-off to
//! whatever stores it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::coordinate::LatLng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Streetlight,
    Pothole,
    Waste,
    Manhole,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 4] = [
        IssueCategory::Streetlight,
        IssueCategory::Pothole,
        IssueCategory::Waste,
        IssueCategory::Manhole,
    ];

    pub fn id(self) -> &'static str {
        match self {
            IssueCategory::Streetlight => "streetlight",
            IssueCategory::Pothole => "pothole",
            IssueCategory::Waste => "waste",
            IssueCategory::Manhole => "manhole",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueCategory::Streetlight => "Streetlight",
            IssueCategory::Pothole => "Pothole",
            IssueCategory::Waste => "Waste",
            IssueCategory::Manhole => "Manhole",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IssueCategory {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        IssueCategory::ALL
            .into_iter()
            .find(|category| category.id().eq_ignore_ascii_case(needle))
            .ok_or_else(|| SubmitError::UnknownCategory(needle.to_string()))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SubmitError {
    #[error("the report location is not a valid coordinate ({lat_text:?}, {lng_text:?})")]
    InvalidPosition { lat_text: String, lng_text: String },
    #[error("unknown issue category {0:?}")]
    UnknownCategory(String),
}

/// What the citizen filled in, ready for the submission collaborator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportDraft {
    pub title: String,
    pub category: IssueCategory,
    /// File name of the attached photo; the bytes are not kept.
    pub image_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub submitted_at: DateTime<Utc>,
}

impl ReportDraft {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Receives finished drafts.
pub trait ReportSink {
    fn accept(&self, draft: &ReportDraft);
}

/// Logs each draft and drops it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn accept(&self, draft: &ReportDraft) {
        metrics::counter!("snapfix_reports_submitted_total", "category" => draft.category.id())
            .increment(1);
        info!(
            title = %draft.title,
            category = draft.category.id(),
            image = draft.image_name.as_deref().unwrap_or("-"),
            lat = draft.latitude,
            lng = draft.longitude,
            "report submitted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_parse_by_id() {
        assert_eq!("pothole".parse::<IssueCategory>(), Ok(IssueCategory::Pothole));
        assert_eq!(" Manhole ".parse::<IssueCategory>(), Ok(IssueCategory::Manhole));
        assert_eq!(
            "graffiti".parse::<IssueCategory>(),
            Err(SubmitError::UnknownCategory("graffiti".into()))
        );
    }

    #[test]
    fn categories_serialize_as_ids() {
        let json = serde_json::to_string(&IssueCategory::ALL).unwrap();
        assert_eq!(json, r#"["streetlight","pothole","waste","manhole"]"#);
        assert_eq!(IssueCategory::Waste.to_string(), "Waste");
    }
}
