//! Fixed-interval polling over network state.
//!
//! `poll_until` re-evaluates a predicate every `poll_interval` until it yields
//! a value or `max_poll_time` elapses. There is no jitter and no cancellation;
//! a timed-out poll returns `AppError::Timeout` and the caller aborts.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Options for a polling loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Give up once this much time has passed since the first evaluation
    pub max_poll_time: Duration,
    /// Sleep between evaluations
    pub poll_interval: Duration,
    /// What is being waited for; used in logs and the timeout error
    pub description: String,
}

impl PollOptions {
    pub fn new(description: impl Into<String>) -> Self {
        PollOptions {
            max_poll_time: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            description: description.into(),
        }
    }

    pub fn max_poll_time(mut self, max_poll_time: Duration) -> Self {
        self.max_poll_time = max_poll_time;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// A condition re-evaluated by [`poll_condition`].
#[async_trait]
pub trait PollCondition: Send {
    /// Evaluate once. `Ok(true)` ends the poll.
    async fn evaluate(&mut self) -> AppResult<bool>;
}

/// Side effect run between polls to force the server to re-fetch state
/// (e.g. reopening a modal, re-triggering an evaluation endpoint).
#[async_trait]
pub trait PollRefresh: Send {
    async fn refresh(&mut self) -> AppResult<()>;
}

/// Attempt bookkeeping shared by the polling loops.
struct Poller<'o> {
    options: &'o PollOptions,
    started: Instant,
    attempts: u32,
    last_error: Option<String>,
}

impl<'o> Poller<'o> {
    fn new(options: &'o PollOptions) -> Self {
        Poller {
            options,
            started: Instant::now(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Record one evaluation; returns the value once satisfied.
    fn observe<T>(&mut self, outcome: AppResult<Option<T>>) -> Option<T> {
        self.attempts += 1;
        match outcome {
            Ok(Some(value)) => {
                info!(
                    "{} satisfied after {} attempt(s) in {:?}",
                    self.options.description,
                    self.attempts,
                    self.started.elapsed()
                );
                Some(value)
            }
            Ok(None) => {
                debug!(
                    "{}: not yet (attempt {})",
                    self.options.description, self.attempts
                );
                None
            }
            Err(e) => {
                self.record_error(&e);
                None
            }
        }
    }

    fn record_error(&mut self, e: &AppError) {
        warn!(
            "{}: poll attempt {} failed: {}",
            self.options.description, self.attempts, e
        );
        self.last_error = Some(e.to_string());
    }

    /// Sleep one interval, or fail if the next attempt would start past the deadline.
    async fn wait(&mut self) -> AppResult<()> {
        let elapsed = self.started.elapsed();
        if elapsed + self.options.poll_interval > self.options.max_poll_time {
            return Err(AppError::Timeout {
                description: self.options.description.clone(),
                elapsed_ms: elapsed.as_millis(),
                last_error: self.last_error.take(),
            });
        }
        tokio::time::sleep(self.options.poll_interval).await;
        Ok(())
    }
}

/// Poll `predicate` until it returns `Ok(Some(value))`.
///
/// Predicate errors are logged and polling continues; the last one is
/// reported in the timeout error.
pub async fn poll_until<T, F, Fut>(mut predicate: F, options: &PollOptions) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<T>>>,
{
    let mut poller = Poller::new(options);
    loop {
        if let Some(value) = poller.observe(predicate().await) {
            return Ok(value);
        }
        poller.wait().await?;
    }
}

/// Poll a [`PollCondition`] until it holds.
pub async fn poll_condition<C: PollCondition + ?Sized>(
    condition: &mut C,
    options: &PollOptions,
) -> AppResult<()> {
    let mut poller = Poller::new(options);
    loop {
        let outcome = condition.evaluate().await.map(|ok| ok.then_some(()));
        if poller.observe(outcome).is_some() {
            return Ok(());
        }
        poller.wait().await?;
    }
}

/// Source of a JSON document containing a flag list.
#[async_trait]
pub trait FlagSource: Send + Sync {
    async fn fetch(&self) -> AppResult<Value>;
}

/// Whether `document` holds an object whose `field` equals `flag`.
///
/// `list_pointer` selects the array inside the document (`""` for a
/// top-level array). Plain string entries are compared directly.
pub fn contains_flag(document: &Value, list_pointer: &str, field: &str, flag: &str) -> bool {
    let list = if list_pointer.is_empty() {
        Some(document)
    } else {
        document.pointer(list_pointer)
    };
    match list.and_then(Value::as_array) {
        Some(items) => items.iter().any(|item| match item {
            Value::String(s) => s == flag,
            Value::Object(map) => map.get(field).and_then(Value::as_str) == Some(flag),
            _ => false,
        }),
        None => false,
    }
}

/// Wait until the queried flag appears in the list fetched from `source`.
///
/// When `refresh` is given it runs after every unsuccessful poll, before the
/// next fetch. Refresh failures count as failed attempts.
pub async fn poll_for_flag(
    source: &dyn FlagSource,
    query: &FlagQuery,
    options: &PollOptions,
    mut refresh: Option<&mut (dyn PollRefresh + '_)>,
) -> AppResult<Value> {
    let mut poller = Poller::new(options);
    loop {
        let outcome = source.fetch().await.map(|document| {
            contains_flag(&document, &query.list_pointer, &query.field, &query.flag)
                .then_some(document)
        });
        if let Some(document) = poller.observe(outcome) {
            return Ok(document);
        }
        poller.wait().await?;

        if let Some(r) = refresh.as_deref_mut()
            && let Err(e) = r.refresh().await
        {
            poller.record_error(&e);
        }
    }
}

/// Which flag to look for and where.
#[derive(Debug, Clone)]
pub struct FlagQuery {
    pub flag: String,
    /// JSON pointer to the flag array (`""` = document root)
    pub list_pointer: String,
    /// Object field holding the flag identifier
    pub field: String,
}

impl FlagQuery {
    pub fn new(flag: impl Into<String>) -> Self {
        FlagQuery {
            flag: flag.into(),
            list_pointer: String::new(),
            field: "key".to_string(),
        }
    }

    pub fn list_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.list_pointer = pointer.into();
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// JSON document fetched with a GET request.
pub struct HttpJsonSource {
    http_client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpJsonSource {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        HttpJsonSource {
            http_client,
            url: url.into(),
            bearer_token: None,
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl FlagSource for HttpJsonSource {
    async fn fetch(&self) -> AppResult<Value> {
        let mut request = self.http_client.get(&self.url);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Holds once the value at `pointer` in the fetched document equals `expected`.
pub struct JsonFieldCondition<S: FlagSource> {
    source: S,
    pointer: String,
    expected: Value,
}

impl<S: FlagSource> JsonFieldCondition<S> {
    pub fn new(source: S, pointer: impl Into<String>, expected: Value) -> Self {
        JsonFieldCondition {
            source,
            pointer: pointer.into(),
            expected,
        }
    }
}

#[async_trait]
impl<S: FlagSource> PollCondition for JsonFieldCondition<S> {
    async fn evaluate(&mut self) -> AppResult<bool> {
        let document = self.source.fetch().await?;
        let actual = document.pointer(&self.pointer);
        debug!("{} = {:?} (want {})", self.pointer, actual, self.expected);
        Ok(actual == Some(&self.expected))
    }
}
