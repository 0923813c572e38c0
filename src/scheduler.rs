//! The in-process scheduler: a catch-up run when the process starts, then one
//! run per day at a configured local time.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time::{Date, OffsetDateTime, Time, UtcOffset};
use tokio::signal;

use crate::{
    Error,
    config::SchedulerConfig,
    generation::{DailyReport, run_all},
    timezone::{local_today, resolve_offset},
};

/// Runs the daily generation against a shared database connection.
#[derive(Debug, Clone)]
pub struct Scheduler {
    connection: Arc<Mutex<Connection>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler. The connection should already be initialised.
    pub fn new(connection: Arc<Mutex<Connection>>, config: SchedulerConfig) -> Self {
        Self { connection, config }
    }

    /// The configuration of the scheduler.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run the generation for today in the configured timezone.
    ///
    /// # Errors
    /// Returns an error if the timezone is invalid, the database lock is
    /// poisoned or the blocking task panics. Failures within the run are
    /// reported in the [DailyReport].
    pub async fn run_pass(&self) -> Result<DailyReport, Error> {
        let date = local_today(self.config.timezone.as_deref())?;

        self.run_pass_for(date).await
    }

    /// Run the generation for `date` on a blocking thread.
    ///
    /// # Errors
    /// Returns an error if the database lock is poisoned or the blocking task
    /// panics.
    pub async fn run_pass_for(&self, date: Date) -> Result<DailyReport, Error> {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;

            Ok(run_all(date, &connection))
        })
        .await
        .map_err(|error| Error::BackgroundTaskFailed(error.to_string()))?
    }

    /// Run the catch-up pass, then one pass a day at the configured time until
    /// `shutdown` resolves.
    ///
    /// The catch-up pass always runs to completion. A pass that is in
    /// progress when `shutdown` resolves is abandoned, the next start picks up
    /// today's remaining work.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        tracing::info!(
            event = "scheduler.catch_up",
            timezone = self.config.timezone.as_deref().unwrap_or("UTC"),
            "running catch-up pass"
        );
        log_pass(self.run_pass().await);

        loop {
            let now = OffsetDateTime::now_utc();
            let offset = resolve_offset(self.config.timezone.as_deref(), now)
                .unwrap_or_else(|error| {
                    tracing::error!("{error}, scheduling in UTC");
                    UtcOffset::UTC
                });
            let wait = duration_until_next_run(now, self.config.run_at, offset);

            tracing::info!(
                event = "scheduler.sleep",
                seconds = wait.as_secs(),
                run_at = %self.config.run_at,
                "next run in {}s",
                wait.as_secs()
            );

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!(event = "scheduler.shutdown", "scheduler stopped");
                    return;
                }
                result = async {
                    tokio::time::sleep(wait).await;
                    self.run_pass().await
                } => log_pass(result),
            }
        }
    }
}

fn log_pass(result: Result<DailyReport, Error>) {
    if let Err(error) = result {
        tracing::error!("scheduled run failed: {error}");
    }
}

/// How long to wait from `now` until the next `run_at` in the timezone with
/// `offset`. If `run_at` has already passed today, the next run is tomorrow.
pub fn duration_until_next_run(
    now: OffsetDateTime,
    run_at: Time,
    offset: UtcOffset,
) -> std::time::Duration {
    let local_now = now.to_offset(offset);
    let mut next_run = local_now.replace_time(run_at);

    if next_run <= local_now {
        next_run += time::Duration::days(1);
    }

    std::time::Duration::try_from(next_run - local_now).unwrap_or(std::time::Duration::ZERO)
}

/// Resolve when the process receives Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("could not listen for Ctrl+C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("could not listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }
}
