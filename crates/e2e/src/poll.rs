//! Bounded polling over backend-driven console state
//!
//! Every wait in the harness goes through [`wait_until`] or
//! [`wait_until_gone`]. Both re-evaluate a predicate at a fixed interval and
//! give up once the timeout elapses, so no wait can outlive
//! `timeout + interval` plus the cost of one predicate evaluation.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

use crate::error::{E2eError, E2eResult};

/// Interval for checks that only read already-rendered state
pub const LIGHT_POLL: Duration = Duration::from_millis(300);

/// Interval for checks that perform I/O of their own
pub const IO_POLL: Duration = Duration::from_millis(1000);

/// What to do when a wait runs out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Fail with [`E2eError::Timeout`] carrying the wait's label
    Hard,
    /// Return `false`
    Soft,
}

/// Parameters of one bounded wait
#[derive(Debug, Clone)]
pub struct Wait {
    pub timeout: Duration,
    pub interval: Duration,
    pub mode: WaitMode,
    /// Diagnostic carried by the timeout error
    pub label: String,
}

impl Wait {
    pub fn hard(label: impl Into<String>, timeout: Duration) -> Self {
        Self {
            timeout,
            interval: LIGHT_POLL,
            mode: WaitMode::Hard,
            label: label.into(),
        }
    }

    pub fn soft(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: LIGHT_POLL,
            mode: WaitMode::Soft,
            label: String::new(),
        }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn expire(&self) -> E2eResult<bool> {
        match self.mode {
            WaitMode::Hard => Err(E2eError::Timeout(format!(
                "{} ({} ms)",
                self.label,
                self.timeout.as_millis()
            ))),
            WaitMode::Soft => Ok(false),
        }
    }
}

/// One-shot hook fired part-way through a [`wait_until_gone`].
///
/// Works around consoles that stop re-rendering after a backend change.
pub struct Refresh<'a> {
    pub after: Duration,
    hook: Box<dyn FnMut() -> BoxFuture<'a, E2eResult<()>> + Send + 'a>,
}

impl<'a> Refresh<'a> {
    pub fn new<F>(after: Duration, hook: F) -> Self
    where
        F: FnMut() -> BoxFuture<'a, E2eResult<()>> + Send + 'a,
    {
        Self {
            after,
            hook: Box::new(hook),
        }
    }
}

/// Wait until `predicate` holds.
///
/// Evaluation errors count as "not yet" (a node that was just re-rendered
/// can fail a read once) and polling continues until the timeout.
pub async fn wait_until<F, Fut>(wait: &Wait, mut predicate: F) -> E2eResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let deadline = Instant::now() + wait.timeout;
    loop {
        match predicate().await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => trace!("predicate for '{}' failed, retrying: {}", wait.label, e),
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("wait for '{}' expired", wait.label);
            return wait.expire();
        }
        sleep(wait.interval.min(deadline - now)).await;
    }
}

/// Wait until `present` stops holding.
///
/// An evaluation error means the referenced object no longer exists and
/// counts as gone.
pub async fn wait_until_gone<F, Fut>(wait: &Wait, present: F) -> E2eResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    wait_until_gone_with_refresh(wait, present, None).await
}

/// [`wait_until_gone`] with an optional mid-wait [`Refresh`].
pub async fn wait_until_gone_with_refresh<F, Fut>(
    wait: &Wait,
    mut present: F,
    mut refresh: Option<Refresh<'_>>,
) -> E2eResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let start = Instant::now();
    let deadline = start + wait.timeout;
    loop {
        match present().await {
            Ok(false) => return Ok(true),
            Err(e) => {
                trace!("'{}' treated as gone: {}", wait.label, e);
                return Ok(true);
            }
            Ok(true) => {}
        }

        if let Some(mut r) = refresh.take() {
            if start.elapsed() >= r.after {
                if let Err(e) = (r.hook)().await {
                    warn!("refresh during '{}' failed: {}", wait.label, e);
                }
            } else {
                refresh = Some(r);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("wait for '{}' to disappear expired", wait.label);
            return wait.expire();
        }
        sleep(wait.interval.min(deadline - now)).await;
    }
}
