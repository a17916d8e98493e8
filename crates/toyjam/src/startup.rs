//! Boot helpers: audio engine init with retry, and the startup chime

use std::fmt::Display;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// `None` retries until cancelled
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

#[derive(Debug)]
pub enum InitOutcome<T> {
    Ready { value: T, attempts: u32 },
    Failed { attempts: u32, last_error: String },
    Cancelled { attempts: u32 },
}

/// Call `attempt` until it succeeds, the policy gives up, or `cancel` fires
pub async fn init_with_retry<T, E, F>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> InitOutcome<T>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return InitOutcome::Cancelled { attempts };
        }
        attempts += 1;

        let error = match attempt() {
            Ok(value) => {
                if attempts > 1 {
                    info!(attempts, "audio engine ready after retry");
                }
                return InitOutcome::Ready { value, attempts };
            }
            Err(e) => e.to_string(),
        };

        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            warn!(attempts, error = %error, "audio engine init failed, giving up");
            return InitOutcome::Failed {
                attempts,
                last_error: error,
            };
        }
        warn!(
            attempts,
            error = %error,
            retry_in_ms = policy.backoff.as_millis() as u64,
            "audio engine init failed"
        );

        tokio::select! {
            _ = cancel.cancelled() => return InitOutcome::Cancelled { attempts },
            _ = tokio::time::sleep(policy.backoff) => {}
        }
    }
}

/// Run the configured chime command in the background
///
/// Nothing waits on it; the exit status and any stderr are logged.
pub fn spawn_startup_chime(command: &[String]) -> Option<JoinHandle<()>> {
    let (program, args) = command.split_first()?;
    let program = program.clone();
    let args = args.to_vec();

    Some(tokio::spawn(async move {
        let output = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => info!(%program, "startup chime played"),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                warn!(%program, status = %out.status, stderr = %stderr.trim(), "startup chime failed");
            }
            Err(e) => warn!(%program, error = %e, "startup chime could not run"),
        }
    }))
}
