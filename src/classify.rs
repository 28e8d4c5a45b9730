//! Label set to semantic alert derivation.
//!
//! Classification is independent of geometry: it looks only at the set of
//! detected class names for one completed submission and maps them to a small
//! fixed set of alerts. Alerts are derived values, recomputed fresh per result
//! and never stored.

use serde::{Deserialize, Serialize};

use crate::normalize_label;

/// Class name that raises an accident alert.
pub const ACCIDENT_LABEL: &str = "accident";

/// Class names that raise a crime alert.
pub const CRIME_LABELS: [&str; 3] = ["robbery", "theft", "violence"];

/// Semantic alert derived from one submission's label set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alert {
    Accident,
    Crime,
    /// Emitted only when no other alert fires.
    AllClear,
}

impl Alert {
    /// Human-readable message for the presentation layer.
    pub fn message(self) -> &'static str {
        match self {
            Alert::Accident => "Accident Detected",
            Alert::Crime => "Crime Detected",
            Alert::AllClear => "No Accident or Crime Detected",
        }
    }

    pub fn is_incident(self) -> bool {
        !matches!(self, Alert::AllClear)
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Map a label set to its ordered alert list.
///
/// Rules are evaluated independently and are not mutually exclusive: accident
/// and crime may both fire, in that order. `AllClear` appears exactly when the
/// list would otherwise be empty. Output depends only on the (normalized) label
/// set, never on input order or multiplicity.
pub fn classify<I, S>(labels: I) -> Vec<Alert>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut has_accident = false;
    let mut has_crime = false;
    for label in labels {
        let label = normalize_label(label.as_ref());
        if label == ACCIDENT_LABEL {
            has_accident = true;
        }
        if CRIME_LABELS.contains(&label.as_str()) {
            has_crime = true;
        }
    }

    let mut alerts = Vec::with_capacity(2);
    if has_accident {
        alerts.push(Alert::Accident);
    }
    if has_crime {
        alerts.push(Alert::Crime);
    }
    if alerts.is_empty() {
        alerts.push(Alert::AllClear);
    }
    alerts
}
