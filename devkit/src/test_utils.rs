/*!
Test Harness pour le moniteur Downage

Facilite l'écriture de scénarios de coupure avec:
- Horloge synthétique (secondes depuis un instant fixe)
- Prober scripté à la place du ping système
- Assertions sur les épisodes stockés et leur export JSON
*/

use crate::memory_sink::MemorySink;
use crate::mock_prober::ScriptedProber;
use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use downage_monitor::{Episode, EpisodeSink, Monitor, Transition};

/// Harness de test complet pour le moniteur
pub struct TestHarness {
    pub prober: ScriptedProber,
    pub monitor: Monitor<ScriptedProber>,
    epoch: DateTime<Utc>,
}

/// Épisode attendu: (début en secondes, durée en ms, en cours)
pub type ExpectedEpisode = (i64, i64, bool);

impl TestHarness {
    /// Harness avec deux serveurs ("A", "B") et un sink mémoire
    pub fn new() -> Self {
        Self::with_sink(Box::new(MemorySink::new()))
    }

    /// Harness sur un backend de stockage donné
    pub fn with_sink(sink: Box<dyn EpisodeSink>) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let prober = ScriptedProber::new();
        let monitor = Monitor::new(
            prober.clone(),
            sink,
            vec!["A".to_string(), "B".to_string()],
            std::time::Duration::from_secs(30),
        );

        Self {
            prober,
            monitor,
            epoch: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    /// Instant synthétique `secs` secondes après l'origine
    pub fn at(&self, secs: i64) -> DateTime<Utc> {
        self.epoch + Duration::seconds(secs)
    }

    /// Un tick complet (sonde + tracker + stockage) avec le réseau up ou down
    pub async fn sample_at(&mut self, secs: i64, up: bool) -> Result<Option<Transition>> {
        self.prober.set_network(up);
        let now = self.at(secs);
        let transition = self.monitor.tick(now).await?;
        log::info!(
            "⏱️ t={}s {} -> {}",
            secs,
            if up { "up" } else { "down" },
            transition.as_ref().map(Transition::kind).unwrap_or("none")
        );
        Ok(transition)
    }

    /// Rejoue une suite de (secondes, up)
    pub async fn run_script(&mut self, steps: &[(i64, bool)]) -> Result<Vec<Option<Transition>>> {
        let mut emitted = Vec::with_capacity(steps.len());
        for &(secs, up) in steps {
            emitted.push(self.sample_at(secs, up).await?);
        }
        Ok(emitted)
    }

    pub fn stored(&self) -> Result<Vec<Episode>> {
        Ok(self.monitor.sink().dump_all()?)
    }

    /// Vérifie les épisodes stockés (début, durée, en cours)
    pub fn assert_episodes(&self, expected: &[ExpectedEpisode]) -> Result<()> {
        let stored = self.stored()?;
        let actual: Vec<ExpectedEpisode> = stored
            .iter()
            .map(|e| {
                let start_secs = (e.start_time - self.epoch).num_seconds();
                (start_secs, e.duration_ms, e.continuing)
            })
            .collect();

        if actual != expected {
            anyhow::bail!("Episode mismatch: expected {:?}, got {:?}", expected, actual);
        }
        log::info!("✅ {} episode(s) as expected", expected.len());
        Ok(())
    }

    /// Jamais plus d'un épisode en cours
    pub fn assert_single_ongoing(&self) -> Result<()> {
        let ongoing = self.stored()?.iter().filter(|e| e.continuing).count();
        if ongoing > 1 {
            anyhow::bail!("{} episodes marked continuing", ongoing);
        }
        if (ongoing == 1) != self.monitor.tracker().is_continuing() {
            anyhow::bail!("stored continuing flag disagrees with tracker state");
        }
        Ok(())
    }

    /// Export JSON lignes, comme `downage --dump`
    pub fn dump_json_lines(&self) -> Result<Vec<String>> {
        self.stored()?
            .iter()
            .map(|e| serde_json::to_string(e).map_err(Into::into))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro pour créer facilement des tests de scénarios
///
/// ```ignore
/// scenario_test!(test_name, |harness| {
///     harness.run_script(&[(0, false), (30, true)]).await?;
///     harness.assert_episodes(&[(0, 30_000, false)])
/// });
/// ```
#[macro_export]
macro_rules! scenario_test {
    ($name:ident, |$harness:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            let mut harness = $crate::test_utils::TestHarness::new();
            let result: ::anyhow::Result<()> = async {
                let $harness = &mut harness;
                let outcome: ::anyhow::Result<()> = $body;
                outcome
            }
            .await;

            match result {
                Ok(_) => println!("✅ Scenario '{}' passed", stringify!($name)),
                Err(e) => {
                    eprintln!("❌ Scenario '{}' failed: {}", stringify!($name), e);
                    panic!("Scenario failed: {}", e);
                }
            }
        }
    };
}
