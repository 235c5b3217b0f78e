/**
 * EPISODE SINKS - Persistance des épisodes de coupure
 *
 * RÔLE :
 * Ce module définit l'interface commune de stockage des épisodes produits par
 * le tracker, quel que soit le backend choisi au démarrage.
 *
 * FONCTIONNEMENT :
 * - EpisodeSink trait = interface commune (append / update_last / dump_all)
 * - JsonLinesSink = un objet JSON par ligne, fichier réécrit à chaque changement
 * - SqliteSink = table `ping`, une ligne par épisode mise à jour sur place
 * - open_sink() = sélection du backend selon la configuration, une seule fois
 *
 * RÈGLES :
 * - l'épisode en cours est toujours le dernier enregistrement inséré
 * - toute erreur de stockage est fatale pour la boucle de polling
 * - l'état du tracker n'est PAS restauré depuis le stockage au redémarrage
 */

pub mod jsonl;
pub mod sqlite;

pub use jsonl::JsonLinesSink;
pub use sqlite::SqliteSink;

use crate::config::SinkBackend;
use crate::models::Episode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Erreurs possibles lors des opérations de stockage
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt record at line {line}: {source}")]
    CorruptRecord {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Invalid start time {0:?}")]
    InvalidTimestamp(String),
    #[error("No episode stored, nothing to update")]
    NoEpisode,
    #[error("Latest stored episode started at {stored}, update targets {requested}")]
    EpisodeMismatch {
        stored: DateTime<Utc>,
        requested: DateTime<Utc>,
    },
}

/// Informations descriptives d'un sink (pour les logs)
#[derive(Debug, Clone, Serialize)]
pub struct SinkInfo {
    /// Nom du backend ("sqlite", "jsonl", "memory")
    pub backend: String,
    /// Emplacement du stockage
    pub location: String,
}

/// Interface commune que tous les backends de stockage implémentent
pub trait EpisodeSink: Send {
    /// Enregistre un épisode nouvellement ouvert
    fn append(&self, episode: &Episode) -> Result<(), SinkError>;

    /// Réécrit durée et statut du dernier épisode enregistré
    /// L'épisode visé doit avoir la même date de début que le dernier stocké
    fn update_last(&self, episode: &Episode) -> Result<(), SinkError>;

    /// Tous les épisodes dans l'ordre d'insertion
    fn dump_all(&self) -> Result<Vec<Episode>, SinkError>;

    fn info(&self) -> SinkInfo;

    /// Dernier épisode inséré
    fn last(&self) -> Result<Option<Episode>, SinkError> {
        Ok(self.dump_all()?.pop())
    }
}

/// Vérifie que la mise à jour vise bien le dernier épisode stocké
pub(crate) fn ensure_same_episode(stored: &Episode, requested: &Episode) -> Result<(), SinkError> {
    if stored.same_episode(requested) {
        Ok(())
    } else {
        Err(SinkError::EpisodeMismatch {
            stored: stored.start_time,
            requested: requested.start_time,
        })
    }
}

/// Chemin de stockage par défaut selon le backend
pub fn default_path(backend: SinkBackend) -> PathBuf {
    match backend {
        SinkBackend::Sqlite => PathBuf::from("./ping.db"),
        SinkBackend::Jsonl => PathBuf::from("./ping.jsonl"),
    }
}

/// Ouvre le backend choisi par la configuration
pub fn open_sink(backend: SinkBackend, path: &Path) -> Result<Box<dyn EpisodeSink>, SinkError> {
    let sink: Box<dyn EpisodeSink> = match backend {
        SinkBackend::Sqlite => Box::new(SqliteSink::open(path)?),
        SinkBackend::Jsonl => Box::new(JsonLinesSink::open(path)?),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_path(SinkBackend::Sqlite), PathBuf::from("./ping.db"));
        assert_eq!(default_path(SinkBackend::Jsonl), PathBuf::from("./ping.jsonl"));
    }

    #[test]
    fn test_open_sink_selects_backend() {
        let dir = tempfile::tempdir().unwrap();

        let sqlite = open_sink(SinkBackend::Sqlite, &dir.path().join("ping.db")).unwrap();
        assert_eq!(sqlite.info().backend, "sqlite");

        let jsonl = open_sink(SinkBackend::Jsonl, &dir.path().join("ping.jsonl")).unwrap();
        assert_eq!(jsonl.info().backend, "jsonl");
    }
}
