/*!
Prober scripté pour tester sans réseau

Remplace le ping système: chaque serveur répond selon un script (toujours up,
toujours down, ou une séquence de réponses), et chaque tentative est enregistrée.
*/

use async_trait::async_trait;
use downage_monitor::Prober;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct HostScript {
    /// Réponses à consommer dans l'ordre
    queued: VecDeque<bool>,
    /// Réponse une fois la file vide
    fallback: bool,
}

/// Mock Prober qui simule PingProber
#[derive(Clone, Default)]
pub struct ScriptedProber {
    hosts: Arc<Mutex<HashMap<String, HostScript>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    default_up: Arc<Mutex<bool>>,
}

impl ScriptedProber {
    /// Tous les serveurs inconnus sont injoignables
    pub fn new() -> Self {
        Self::default()
    }

    /// Réponse fixe pour un serveur
    pub fn set_host<S: Into<String>>(&self, host: S, up: bool) -> &Self {
        let mut hosts = self.hosts.lock().unwrap();
        let script = hosts.entry(host.into()).or_default();
        script.queued.clear();
        script.fallback = up;
        self
    }

    /// Séquence de réponses pour un serveur, puis `fallback`
    pub fn script_host<S: Into<String>>(
        &self,
        host: S,
        responses: &[bool],
        fallback: bool,
    ) -> &Self {
        let mut hosts = self.hosts.lock().unwrap();
        let script = hosts.entry(host.into()).or_default();
        script.queued = responses.iter().copied().collect();
        script.fallback = fallback;
        self
    }

    /// Bascule tout le réseau: serveurs scriptés et inconnus
    pub fn set_network(&self, up: bool) {
        *self.default_up.lock().unwrap() = up;
        for script in self.hosts.lock().unwrap().values_mut() {
            script.queued.clear();
            script.fallback = up;
        }
        log::info!("🌐 [MOCK] network {}", if up { "up" } else { "down" });
    }

    /// Toutes les tentatives, dans l'ordre
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Nombre de tentatives sur un serveur
    pub fn attempts_for(&self, host: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|h| *h == host)
            .count()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, host: &str) -> bool {
        self.attempts.lock().unwrap().push(host.to_string());

        let default_up = *self.default_up.lock().unwrap();
        let up = match self.hosts.lock().unwrap().get_mut(host) {
            Some(script) => script.queued.pop_front().unwrap_or(script.fallback),
            None => default_up,
        };

        log::debug!("📡 [MOCK] probe {} -> {}", host, if up { "up" } else { "down" });
        up
    }
}
