use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Une période continue pendant laquelle aucun serveur n'a répondu.
///
/// Format sur le fil (une ligne JSON par épisode) :
/// `{"start_time":"2024-05-01T10:00:00Z","duration":45000,"continuing":false}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Id de ligne attribué par le backend SQLite (absent en JSON lignes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    /// Durée en millisecondes
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub continuing: bool,
}

impl Episode {
    /// Nouvel épisode ouvert à `start` (durée nulle, en cours)
    pub fn opened_at(start: DateTime<Utc>) -> Self {
        Self {
            id: None,
            start_time: start,
            duration_ms: 0,
            continuing: true,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    /// Même épisode, identifié par sa date de début
    pub fn same_episode(&self, other: &Episode) -> bool {
        self.start_time == other.start_time
    }
}
