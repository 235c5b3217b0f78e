//! Poll loop
//!
//! At every tick: probe the servers, feed the sample to the tracker and
//! forward whatever it emits to the sink:
//! - `Opened` → append a new record
//! - `Extended` / `Closed` → rewrite the last record
//!
//! Runs until Ctrl-C or a storage failure. Storage failures are returned to
//! the caller and end the process.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::models::Episode;
use crate::prober::{some_host_reachable, Prober};
use crate::sinks::{EpisodeSink, SinkError};
use crate::tracker::{OutageTracker, Transition};

pub struct Monitor<P: Prober> {
    prober: P,
    sink: Box<dyn EpisodeSink>,
    tracker: OutageTracker,
    servers: Vec<String>,
    poll_interval: Duration,
    rng: StdRng,
}

impl<P: Prober> Monitor<P> {
    pub fn new(
        prober: P,
        sink: Box<dyn EpisodeSink>,
        servers: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            prober,
            sink,
            tracker: OutageTracker::new(),
            servers,
            poll_interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed shuffle order, for reproducible runs
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn tracker(&self) -> &OutageTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &dyn EpisodeSink {
        self.sink.as_ref()
    }

    /// One reachability sample across all servers
    pub async fn sample(&mut self) -> bool {
        some_host_reachable(&self.prober, &self.servers, &mut self.rng).await
    }

    /// Probe, then record the sample as taken at `now`
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<Transition>, SinkError> {
        let up = self.sample().await;
        self.record(up, now)
    }

    /// Feed one sample to the tracker and persist what it emits
    pub fn record(
        &mut self,
        sample_up: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition>, SinkError> {
        let transition = self.tracker.observe(sample_up, now);

        match &transition {
            None => debug!("internet up, nothing to record"),
            Some(Transition::Opened(episode)) => {
                self.sink.append(episode)?;
                warn!("Internet down since {}", episode.start_time);
            }
            Some(Transition::Extended(episode)) => {
                self.sink.update_last(episode)?;
                info!(
                    "Internet still down since {} ({})",
                    episode.start_time,
                    format_duration(episode)
                );
            }
            Some(Transition::Closed(episode)) => {
                self.sink.update_last(episode)?;
                info!(
                    "Internet back up after {} (outage started {})",
                    format_duration(episode),
                    episode.start_time
                );
            }
        }

        Ok(transition)
    }

    /// Last stored episode if the previous run stopped in the middle of an outage.
    /// It is left as is: the tracker always starts with no outage in progress.
    pub fn interrupted_episode(&self) -> Result<Option<Episode>, SinkError> {
        Ok(self.sink.last()?.filter(|e| e.continuing))
    }

    /// Poll forever, until Ctrl-C
    pub async fn run(&mut self) -> Result<(), SinkError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` completes or the sink fails
    pub async fn run_until<F: Future<Output = ()>>(
        &mut self,
        shutdown: F,
    ) -> Result<(), SinkError> {
        if let Some(episode) = self.interrupted_episode()? {
            warn!(
                "Previous run stopped during an outage (started {}, {} recorded); a new episode will be opened if still down",
                episode.start_time,
                format_duration(&episode)
            );
        }

        let info = self.sink.info();
        info!(
            "Polling {} server(s) every {} ({} storage at {})",
            self.servers.len(),
            humantime::format_duration(self.poll_interval),
            info.backend,
            info.location
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    match self.tracker.open_episode() {
                        Some(episode) => info!(
                            "Stopping during an outage started {}; record left as continuing",
                            episode.start_time
                        ),
                        None => info!("Stopping"),
                    }
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.tick(now).await?;
                }
            }
        }
    }
}

fn format_duration(episode: &Episode) -> String {
    let ms = u64::try_from(episode.duration_ms).unwrap_or(0);
    humantime::format_duration(Duration::from_millis(ms)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkBackend;
    use crate::sinks::{open_sink, JsonLinesSink, SqliteSink};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Whole network up or down, switchable from the test
    #[derive(Clone)]
    struct SwitchProber {
        up: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Prober for SwitchProber {
        async fn probe(&self, _host: &str) -> bool {
            self.up.load(Ordering::SeqCst)
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn monitor(up: bool) -> (Monitor<SwitchProber>, Arc<AtomicBool>) {
        monitor_on(Box::new(SqliteSink::open_in_memory().unwrap()), up)
    }

    fn monitor_on(
        sink: Box<dyn EpisodeSink>,
        up: bool,
    ) -> (Monitor<SwitchProber>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(up));
        let prober = SwitchProber { up: flag.clone() };
        let monitor = Monitor::new(
            prober,
            sink,
            vec!["8.8.8.8".into(), "1.1.1.1".into()],
            Duration::from_millis(10),
        )
        .with_rng(StdRng::seed_from_u64(3));
        (monitor, flag)
    }

    #[tokio::test]
    async fn test_outage_scenario_is_persisted() {
        let (mut monitor, up) = monitor(false);

        let kind = |emitted: Option<Transition>| emitted.as_ref().map(Transition::kind);

        assert_eq!(kind(monitor.tick(t(0)).await.unwrap()), Some("opened"));
        assert_eq!(kind(monitor.tick(t(30)).await.unwrap()), Some("extended"));

        up.store(true, Ordering::SeqCst);
        assert_eq!(kind(monitor.tick(t(45)).await.unwrap()), Some("closed"));
        assert!(monitor.tick(t(75)).await.unwrap().is_none());

        let episodes = monitor.sink().dump_all().unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].start_time, t(0));
        assert_eq!(episodes[0].duration_ms, 45_000);
        assert!(!episodes[0].continuing);
    }

    #[tokio::test]
    async fn test_two_outages_give_two_records() {
        let (mut monitor, _) = monitor(true);

        monitor.record(false, t(0)).unwrap();
        monitor.record(true, t(30)).unwrap();
        monitor.record(true, t(60)).unwrap();
        monitor.record(false, t(90)).unwrap();
        monitor.record(false, t(120)).unwrap();

        let episodes = monitor.sink().dump_all().unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!((episodes[0].duration_ms, episodes[0].continuing), (30_000, false));
        assert_eq!((episodes[1].duration_ms, episodes[1].continuing), (30_000, true));
        assert_eq!(episodes.iter().filter(|e| e.continuing).count(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_episode_detected_but_not_resumed() {
        let (mut monitor, _) = monitor(false);
        monitor.record(false, t(0)).unwrap();

        // nouveau processus sur le même stockage
        let flag = Arc::new(AtomicBool::new(false));
        let sink = Box::new(SqliteSink::open_in_memory().unwrap());
        sink.append(&monitor.sink().dump_all().unwrap()[0]).unwrap();
        let mut restarted = Monitor::new(
            SwitchProber { up: flag },
            sink,
            vec!["a".into()],
            Duration::from_secs(1),
        );

        assert!(restarted.interrupted_episode().unwrap().is_some());
        assert!(!restarted.tracker().is_continuing());

        restarted.record(false, t(60)).unwrap();
        let episodes = restarted.sink().dump_all().unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[1].start_time, t(60));
    }

    #[tokio::test]
    async fn test_restart_after_clock_moved_back() {
        let dir = tempfile::tempdir().unwrap();

        for (backend, file) in [
            (SinkBackend::Sqlite, "ping.db"),
            (SinkBackend::Jsonl, "ping.jsonl"),
        ] {
            let path = dir.path().join(file);

            // premier run interrompu pendant une coupure à 12:00
            let (mut before, _) = monitor_on(open_sink(backend, &path).unwrap(), false);
            before.record(false, t(7200)).unwrap();
            drop(before);

            // le second run démarre avec une horloge corrigée à 11:00
            let (mut after, _) = monitor_on(open_sink(backend, &path).unwrap(), false);
            after.record(false, t(3600)).unwrap();
            let extended = after.record(false, t(3630)).unwrap();
            let kind = extended.as_ref().map(Transition::kind);
            assert_eq!(kind, Some("extended"), "backend {backend:?}");

            let episodes = after.sink().dump_all().unwrap();
            assert_eq!(episodes.len(), 2, "backend {backend:?}");
            assert_eq!(episodes[0].start_time, t(7200), "backend {backend:?}");
            assert_eq!(episodes[0].duration_ms, 0, "backend {backend:?}");
            assert_eq!(episodes[1].start_time, t(3600), "backend {backend:?}");
            assert_eq!(episodes[1].duration_ms, 30_000, "backend {backend:?}");
        }
    }

    #[tokio::test]
    async fn test_wall_clock_instants_on_file_backends() {
        let dir = tempfile::tempdir().unwrap();
        let sinks: Vec<Box<dyn EpisodeSink>> = vec![
            Box::new(SqliteSink::open(dir.path().join("ping.db")).unwrap()),
            Box::new(JsonLinesSink::open(dir.path().join("ping.jsonl")).unwrap()),
        ];

        for sink in sinks {
            let backend = sink.info().backend;
            let (mut monitor, _) = monitor_on(sink, false);
            let t0 = t(0) + chrono::Duration::nanoseconds(123_456_789);

            monitor.record(false, t0).unwrap();
            monitor
                .record(false, t0 + chrono::Duration::seconds(30))
                .unwrap();
            monitor
                .record(true, t0 + chrono::Duration::milliseconds(45_250))
                .unwrap();

            let now = Utc::now();
            monitor.record(false, now).unwrap();
            monitor
                .record(false, now + chrono::Duration::microseconds(30_000_777))
                .unwrap();

            let episodes = monitor.sink().dump_all().unwrap();
            assert_eq!(episodes.len(), 2, "backend {backend}");
            assert_eq!(episodes[0].start_time, t0, "backend {backend}");
            assert_eq!(episodes[0].duration_ms, 45_250, "backend {backend}");
            assert!(!episodes[0].continuing, "backend {backend}");
            assert_eq!(episodes[1].start_time, now, "backend {backend}");
            assert_eq!(episodes[1].duration_ms, 30_000, "backend {backend}");
            assert!(episodes[1].continuing, "backend {backend}");
        }
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let (mut monitor, _) = monitor(false);

        monitor
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        let episodes = monitor.sink().dump_all().unwrap();
        assert_eq!(episodes.len(), 1);
        assert!(episodes[0].continuing);
        assert!(episodes[0].duration_ms > 0, "episode never extended");
        assert_eq!(
            Some(episodes[0].duration_ms),
            monitor.tracker().open_episode().map(|e| e.duration_ms)
        );
    }
}
