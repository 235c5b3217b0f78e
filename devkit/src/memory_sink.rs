/*!
Sink mémoire pour tests sans disque

Même contrat que les backends SQLite / JSON lignes, avec en plus:
- accès partagé aux épisodes (le harness garde un clone, le moniteur l'autre)
- injection de pannes d'écriture pour tester le caractère fatal du stockage
*/

use downage_monitor::{Episode, EpisodeSink, SinkError, SinkInfo};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemorySink {
    episodes: Arc<Mutex<Vec<Episode>>>,
    fail_next: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// La prochaine écriture (append ou update) échouera
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Nombre d'écritures réussies
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn episodes(&self) -> Vec<Episode> {
        self.episodes.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), SinkError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            log::warn!("💥 [MOCK] injected write failure");
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        Ok(())
    }
}

impl EpisodeSink for MemorySink {
    fn append(&self, episode: &Episode) -> Result<(), SinkError> {
        self.check_failure()?;
        self.episodes.lock().unwrap().push(episode.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_last(&self, episode: &Episode) -> Result<(), SinkError> {
        self.check_failure()?;
        let mut episodes = self.episodes.lock().unwrap();
        let last = episodes.last_mut().ok_or(SinkError::NoEpisode)?;
        if !last.same_episode(episode) {
            return Err(SinkError::EpisodeMismatch {
                stored: last.start_time,
                requested: episode.start_time,
            });
        }
        last.duration_ms = episode.duration_ms;
        last.continuing = episode.continuing;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dump_all(&self) -> Result<Vec<Episode>, SinkError> {
        Ok(self.episodes())
    }

    fn info(&self) -> SinkInfo {
        SinkInfo {
            backend: "memory".to_string(),
            location: "in-process".to_string(),
        }
    }
}
