use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{CronEngine, CronEntry, JobFn};
use crate::CronError;

/// [`CronEngine`] driving each trigger with its own sleeping task.
///
/// Specs use the six-field form with seconds first (`0 30 3 * * *`) or the
/// `@hourly`-style shorthands.
#[derive(Clone, Default)]
pub struct TokioCron {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Present while started; every driver runs under a child of it.
    root: Option<CancellationToken>,
}

struct Entry {
    spec: String,
    schedule: Schedule,
    job: JobFn,
    driver: Option<CancellationToken>,
}

impl TokioCron {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn parse_spec(spec: &str) -> Result<Schedule, CronError> {
    Schedule::from_str(spec.trim()).map_err(|e| CronError::InvalidSpec {
        spec: spec.to_string(),
        reason: e.to_string(),
    })
}

fn spawn_driver(name: String, schedule: Schedule, job: JobFn, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut last = Local::now();
        loop {
            let Some(next) = schedule.after(&last).next() else {
                debug!(trigger = %name, "schedule exhausted");
                return;
            };
            let wait = (next - Local::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {
                    trace!(trigger = %name, "fire");
                    tokio::spawn(job());
                    last = next.max(Local::now());
                }
            }
        }
    });
}

impl CronEngine for TokioCron {
    fn add_func(&self, spec: &str, name: &str, job: JobFn) -> Result<(), CronError> {
        let schedule = parse_spec(spec)?;
        let mut inner = self.lock();
        if inner.entries.contains_key(name) {
            return Err(CronError::Duplicate(name.to_string()));
        }

        let driver = inner.root.as_ref().map(|root| {
            let token = root.child_token();
            spawn_driver(name.to_string(), schedule.clone(), Arc::clone(&job), token.clone());
            token
        });
        inner.entries.insert(
            name.to_string(),
            Entry {
                spec: spec.to_string(),
                schedule,
                job,
                driver,
            },
        );
        Ok(())
    }

    fn remove_job(&self, name: &str) {
        if let Some(entry) = self.lock().entries.remove(name)
            && let Some(driver) = entry.driver
        {
            driver.cancel();
        }
    }

    fn entries(&self) -> Vec<CronEntry> {
        let inner = self.lock();
        let now = Local::now();
        inner
            .entries
            .iter()
            .map(|(name, e)| CronEntry {
                name: name.clone(),
                spec: e.spec.clone(),
                next: e.schedule.after(&now).next(),
            })
            .collect()
    }

    fn start(&self) {
        let mut inner = self.lock();
        if inner.root.is_some() {
            return;
        }
        let root = CancellationToken::new();
        for (name, entry) in inner.entries.iter_mut() {
            let token = root.child_token();
            spawn_driver(
                name.clone(),
                entry.schedule.clone(),
                Arc::clone(&entry.job),
                token.clone(),
            );
            entry.driver = Some(token);
        }
        inner.root = Some(root);
        debug!(triggers = inner.entries.len(), "cron started");
    }

    fn stop(&self) {
        let mut inner = self.lock();
        if let Some(root) = inner.root.take() {
            root.cancel();
        }
        for entry in inner.entries.values_mut() {
            entry.driver = None;
        }
        debug!("cron stopped");
    }

    fn is_running(&self) -> bool {
        self.lock().root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_job(counter: Arc<AtomicUsize>) -> JobFn {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let cron = TokioCron::new();
        let err = cron
            .add_func("not a spec", "1", counting_job(Arc::default()))
            .unwrap_err();
        assert!(matches!(err, CronError::InvalidSpec { .. }));
        assert!(cron.entries().is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected_and_remove_frees_the_name() {
        let cron = TokioCron::new();
        let job = counting_job(Arc::default());
        cron.add_func("0 0 3 * * *", "7", Arc::clone(&job)).unwrap();
        assert_eq!(
            cron.add_func("0 0 4 * * *", "7", Arc::clone(&job)),
            Err(CronError::Duplicate("7".into()))
        );

        cron.remove_job("7");
        cron.add_func("0 0 4 * * *", "7", job).unwrap();
        assert_eq!(cron.entry("7").unwrap().spec, "0 0 4 * * *");
    }

    #[test]
    fn entries_report_next_fire_time() {
        let cron = TokioCron::new();
        cron.add_func("@hourly", "h", counting_job(Arc::default())).unwrap();
        let entry = cron.entry("h").unwrap();
        let next = entry.next.unwrap();
        assert!(next > Local::now());
        assert!(next - Local::now() <= chrono::Duration::hours(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fires_every_second_until_stopped() {
        let cron = TokioCron::new();
        let counter = Arc::new(AtomicUsize::new(0));
        cron.add_func("* * * * * *", "tick", counting_job(Arc::clone(&counter)))
            .unwrap();

        cron.start();
        assert!(cron.is_running());
        tokio::time::sleep(Duration::from_millis(2600)).await;
        cron.stop();
        assert!(!cron.is_running());

        let fired = counter.load(Ordering::SeqCst);
        assert!((2..=3).contains(&fired), "fired {fired} times");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn removed_trigger_stops_firing() {
        let cron = TokioCron::new();
        let counter = Arc::new(AtomicUsize::new(0));
        cron.start();
        cron.add_func("* * * * * *", "tick", counting_job(Arc::clone(&counter)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        cron.remove_job("tick");
        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
        cron.stop();
    }
}
