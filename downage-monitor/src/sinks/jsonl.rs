/**
 * SINK JSON LIGNES - Stockage des épisodes dans un fichier texte
 *
 * FONCTIONNEMENT :
 * - Un épisode = un objet JSON sur une ligne (même format que --dump)
 * - Cache mémoire chargé à l'ouverture, fichier réécrit à chaque changement
 * - L'épisode en cours est toujours la dernière ligne
 *
 * EXEMPLE :
 * ```text
 * {"start_time":"2024-05-01T10:00:00Z","duration":45000,"continuing":false}
 * {"start_time":"2024-05-01T12:30:00Z","duration":30000,"continuing":true}
 * ```
 */

use super::{ensure_same_episode, EpisodeSink, SinkError, SinkInfo};
use crate::models::Episode;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

pub struct JsonLinesSink {
    /// Chemin du fichier de stockage
    storage_path: PathBuf,
    /// Cache en mémoire des épisodes, dans l'ordre d'insertion
    cache: parking_lot::Mutex<Vec<Episode>>,
}

impl JsonLinesSink {
    /// Ouvre (ou crée) le fichier de stockage
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, SinkError> {
        let path = storage_path.into();
        let sink = Self {
            storage_path: path.clone(),
            cache: parking_lot::Mutex::new(Vec::new()),
        };

        sink.load_from_disk()?;
        debug!("jsonl sink initialized at {:?}", path);
        Ok(sink)
    }

    fn load_from_disk(&self) -> Result<(), SinkError> {
        if !self.storage_path.exists() {
            if let Some(parent) = self.storage_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&self.storage_path, "")?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let mut episodes = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let episode: Episode = serde_json::from_str(line)
                .map_err(|source| SinkError::CorruptRecord { line: idx + 1, source })?;
            episodes.push(episode);
        }

        *self.cache.lock() = episodes;
        Ok(())
    }

    /// Réécrit le fichier complet depuis le cache
    fn save_to_disk(&self, episodes: &[Episode]) -> Result<(), SinkError> {
        let mut buf = Vec::new();
        for episode in episodes {
            serde_json::to_writer(&mut buf, episode)?;
            buf.push(b'\n');
        }

        // écriture dans un fichier voisin puis renommage, pas de fichier tronqué
        let tmp_path = self.storage_path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.storage_path)?;
        Ok(())
    }
}

impl EpisodeSink for JsonLinesSink {
    fn append(&self, episode: &Episode) -> Result<(), SinkError> {
        let mut cache = self.cache.lock();
        cache.push(episode.clone());
        if let Err(e) = self.save_to_disk(&cache) {
            cache.pop();
            return Err(e);
        }
        Ok(())
    }

    fn update_last(&self, episode: &Episode) -> Result<(), SinkError> {
        let mut cache = self.cache.lock();
        let last = cache.last_mut().ok_or(SinkError::NoEpisode)?;
        ensure_same_episode(last, episode)?;

        last.duration_ms = episode.duration_ms;
        last.continuing = episode.continuing;
        self.save_to_disk(&cache)
    }

    fn dump_all(&self) -> Result<Vec<Episode>, SinkError> {
        Ok(self.cache.lock().clone())
    }

    fn info(&self) -> SinkInfo {
        SinkInfo {
            backend: "jsonl".to_string(),
            location: self.storage_path.display().to_string(),
        }
    }

    fn last(&self) -> Result<Option<Episode>, SinkError> {
        Ok(self.cache.lock().last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn start(secs: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_append_update_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ping.jsonl");

        {
            let sink = JsonLinesSink::open(&path).unwrap();
            let mut episode = Episode::opened_at(start(0));
            sink.append(&episode).unwrap();

            episode.duration_ms = 30_000;
            sink.update_last(&episode).unwrap();

            episode.duration_ms = 45_000;
            episode.continuing = false;
            sink.update_last(&episode).unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(
            content.lines().next().unwrap(),
            r#"{"start_time":"2024-05-01T10:00:00Z","duration":45000,"continuing":false}"#
        );

        let reopened = JsonLinesSink::open(&path).unwrap();
        let episodes = reopened.dump_all().unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].duration_ms, 45_000);
        assert!(!episodes[0].continuing);
    }

    #[test]
    fn test_update_without_episode_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::open(dir.path().join("ping.jsonl")).unwrap();

        let err = sink.update_last(&Episode::opened_at(start(0))).unwrap_err();
        assert!(matches!(err, SinkError::NoEpisode));
    }

    #[test]
    fn test_update_targets_latest_episode_only() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::open(dir.path().join("ping.jsonl")).unwrap();

        sink.append(&Episode::opened_at(start(0))).unwrap();
        sink.append(&Episode::opened_at(start(600))).unwrap();

        let err = sink.update_last(&Episode::opened_at(start(0))).unwrap_err();
        assert!(matches!(err, SinkError::EpisodeMismatch { .. }));

        assert_eq!(sink.last().unwrap().unwrap().start_time, start(600));
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ping.jsonl");
        fs::write(
            &path,
            "{\"start_time\":\"2024-05-01T10:00:00Z\",\"duration\":0,\"continuing\":true}\nnot json\n",
        )
        .unwrap();

        match JsonLinesSink::open(&path) {
            Err(SinkError::CorruptRecord { line, .. }) => assert_eq!(line, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("corrupt file accepted"),
        }
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ping.jsonl");
        let sink = JsonLinesSink::open(&path).unwrap();
        assert!(path.exists());
        assert!(sink.dump_all().unwrap().is_empty());
    }
}
