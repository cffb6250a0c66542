//! Sequential provider fallback.
//!
//! Providers are tried strictly in configured order; the first attempt that
//! yields a shape-valid result wins and no later provider is contacted. Every
//! per-attempt failure (transport, unsupported tag, malformed output,
//! timeout) is recorded and the chain moves on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audit;
use crate::catalog::Journal;
use crate::prompt::Prompt;
use crate::providers::{Endpoints, ProviderBackend, ProviderError, build_backend};
use crate::request::{AnalysisRequest, InputMode};
use crate::sanitize;
use crate::types::AnalysisResult;
use crate::{Config, ProgressEvent, ProviderConfig};

/// Diagnostic for one failed provider attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub provider: String,
    pub model: String,
    pub error: ProviderError,
    pub elapsed: Duration,
}

/// Successful outcome of a fallback run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    /// Provider that produced `result`.
    pub provider: String,
    pub model: String,
    /// Attempts that failed before the winning one, in order.
    pub failures: Vec<AttemptFailure>,
}

#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("no AI provider is enabled with an API key; configure at least one provider")]
    NoActiveProvider,
    #[error(
        "none of the enabled AI providers returned usable output; check your API keys or try another model"
    )]
    AllProvidersFailed { failures: Vec<AttemptFailure> },
}

impl AnalysisError {
    /// Per-provider diagnostics collected before giving up.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            AnalysisError::NoActiveProvider => &[],
            AnalysisError::AllProvidersFailed { failures } => failures,
        }
    }
}

/// One link of the fallback chain. `backend` is an error when the config
/// could not be turned into a client (unknown provider tag).
pub struct ChainEntry {
    pub provider: String,
    pub model: String,
    pub backend: Result<Arc<dyn ProviderBackend>, ProviderError>,
}

impl ChainEntry {
    pub fn resolve(config: &ProviderConfig, endpoints: &Endpoints) -> Self {
        let backend = build_backend(config, endpoints);
        let model = match &backend {
            Ok(b) => b.model().to_string(),
            Err(_) => config.model.clone(),
        };
        Self {
            provider: config.provider.clone(),
            model,
            backend,
        }
    }

    pub fn from_backend(backend: Arc<dyn ProviderBackend>) -> Self {
        Self {
            provider: backend.name().to_string(),
            model: backend.model().to_string(),
            backend: Ok(backend),
        }
    }
}

/// Runs analyses against the configured provider chain.
pub struct Orchestrator {
    client: reqwest::Client,
    endpoints: Endpoints,
    attempt_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoints: config.endpoints.clone(),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs.max(1)),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Analyze `request` for `journal`, falling back across its active
    /// providers.
    ///
    /// If `on_event` is provided, it is called as each attempt starts and
    /// finishes.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        journal: &Journal,
        on_event: Option<&(dyn Fn(ProgressEvent) + Send + Sync)>,
    ) -> Result<Analysis, AnalysisError> {
        let active = request.active_configs();
        if active.is_empty() {
            return Err(AnalysisError::NoActiveProvider);
        }

        let prompt = Prompt::compose(journal, request);
        let chain: Vec<ChainEntry> = active
            .iter()
            .map(|c| ChainEntry::resolve(c, &self.endpoints))
            .collect();

        tracing::info!(
            journal = journal.id,
            mode = %request.mode,
            providers = chain.len(),
            chars = request.text.chars().count(),
            "starting analysis"
        );

        let mut analysis =
            run_fallback_chain(&chain, &prompt, &self.client, self.attempt_timeout, on_event)
                .await?;

        if request.mode == InputMode::Full {
            let added = audit::apply(&mut analysis.result, &journal.rules);
            if added > 0 {
                tracing::debug!(added, "local length audit added alerts");
            }
        }
        Ok(analysis)
    }
}

/// Try each entry in order until one yields a valid result.
///
/// The same `prompt` is sent to every provider. An empty chain fails with
/// [`AnalysisError::NoActiveProvider`] without any network call.
pub async fn run_fallback_chain(
    chain: &[ChainEntry],
    prompt: &Prompt,
    client: &reqwest::Client,
    attempt_timeout: Duration,
    on_event: Option<&(dyn Fn(ProgressEvent) + Send + Sync)>,
) -> Result<Analysis, AnalysisError> {
    if chain.is_empty() {
        return Err(AnalysisError::NoActiveProvider);
    }

    let total = chain.len();
    let mut failures: Vec<AttemptFailure> = Vec::new();

    for (index, entry) in chain.iter().enumerate() {
        if let Some(cb) = on_event {
            cb(ProgressEvent::Attempting {
                index,
                total,
                provider: entry.provider.clone(),
                model: entry.model.clone(),
            });
        }

        let start = Instant::now();
        let outcome = match &entry.backend {
            Ok(backend) => attempt(backend.as_ref(), prompt, client, attempt_timeout).await,
            Err(e) => Err(e.clone()),
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok(result) => {
                tracing::info!(
                    provider = %entry.provider,
                    model = %entry.model,
                    segments = result.segments.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "analysis succeeded"
                );
                if let Some(cb) = on_event {
                    cb(ProgressEvent::Succeeded {
                        provider: entry.provider.clone(),
                        elapsed,
                    });
                }
                return Ok(Analysis {
                    result,
                    provider: entry.provider.clone(),
                    model: entry.model.clone(),
                    failures,
                });
            }
            Err(error) => {
                tracing::warn!(
                    provider = %entry.provider,
                    error = %error,
                    remaining = total - index - 1,
                    "provider attempt failed, falling back"
                );
                if let Some(cb) = on_event {
                    cb(ProgressEvent::AttemptFailed {
                        index,
                        total,
                        provider: entry.provider.clone(),
                        error: error.clone(),
                    });
                }
                failures.push(AttemptFailure {
                    provider: entry.provider.clone(),
                    model: entry.model.clone(),
                    error,
                    elapsed,
                });
            }
        }
    }

    Err(AnalysisError::AllProvidersFailed { failures })
}

/// One bounded provider call followed by sanitize-and-validate.
async fn attempt(
    backend: &dyn ProviderBackend,
    prompt: &Prompt,
    client: &reqwest::Client,
    timeout: Duration,
) -> Result<AnalysisResult, ProviderError> {
    let raw = match tokio::time::timeout(timeout, backend.send(prompt, client, timeout)).await {
        Ok(result) => result?,
        Err(_) => return Err(ProviderError::Timeout(timeout)),
    };

    sanitize::parse_response(&raw).map_err(|e| {
        tracing::warn!(
            provider = backend.name(),
            error = %e,
            bytes = raw.len(),
            "provider returned unusable output"
        );
        tracing::debug!(provider = backend.name(), raw = %raw, "raw provider output");
        ProviderError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockProvider, MockResponse};
    use crate::sanitize::MalformedResponse;
    use std::sync::Mutex;

    const VALID: &str = r#"{"segments":[{"type":"title","content":"X"}]}"#;

    fn prompt() -> Prompt {
        Prompt {
            system: "sys".into(),
            user: "user".into(),
        }
    }

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    fn chain(mocks: &[Arc<MockProvider>]) -> Vec<ChainEntry> {
        mocks
            .iter()
            .map(|m| ChainEntry::from_backend(Arc::clone(m) as Arc<dyn ProviderBackend>))
            .collect()
    }

    async fn run(entries: &[ChainEntry]) -> Result<Analysis, AnalysisError> {
        run_fallback_chain(entries, &prompt(), &client(), Duration::from_secs(5), None).await
    }

    #[tokio::test]
    async fn empty_chain_fails_fast() {
        let err = run(&[]).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoActiveProvider));
        assert!(err.failures().is_empty());
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let first = Arc::new(MockProvider::new("glm", MockResponse::text(VALID)));
        let second = Arc::new(MockProvider::new("deepseek", MockResponse::text(VALID)));
        let third = Arc::new(MockProvider::new("gemini", MockResponse::text(VALID)));

        let analysis = run(&chain(&[first.clone(), second.clone(), third.clone()]))
            .await
            .unwrap();

        assert_eq!(analysis.provider, "glm");
        assert!(analysis.failures.is_empty());
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
        assert_eq!(third.call_count(), 0);
    }

    #[tokio::test]
    async fn n_failures_then_success_tries_exactly_n_plus_one() {
        for n in 0..4 {
            let log = Arc::new(Mutex::new(Vec::new()));
            let names = ["p0", "p1", "p2", "p3", "p4"];
            let mocks: Vec<Arc<MockProvider>> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let response = if i < n {
                        MockResponse::Status(503)
                    } else {
                        MockResponse::text(VALID)
                    };
                    Arc::new(MockProvider::new(name, response).with_call_log(Arc::clone(&log)))
                })
                .collect();

            let analysis = run(&chain(&mocks)).await.unwrap();

            assert_eq!(analysis.provider, names[n]);
            assert_eq!(analysis.failures.len(), n);
            assert_eq!(*log.lock().unwrap(), names[..=n].to_vec());
            for (i, mock) in mocks.iter().enumerate() {
                assert_eq!(mock.call_count(), usize::from(i <= n), "provider {i} with n={n}");
            }
        }
    }

    #[tokio::test]
    async fn exhaustion_reports_one_diagnostic_per_attempt() {
        let mocks = vec![
            Arc::new(MockProvider::new("glm", MockResponse::Status(401))),
            Arc::new(MockProvider::new("deepseek", MockResponse::text("not json"))),
            Arc::new(MockProvider::new(
                "gemini",
                MockResponse::text(r#"{"segments": "nope"}"#),
            )),
        ];
        let err = run(&chain(&mocks)).await.unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].provider, "glm");
        assert_eq!(failures[0].error.status(), Some(401));
        assert!(matches!(
            failures[1].error,
            ProviderError::MalformedResponse(MalformedResponse::InvalidJson(_))
        ));
        assert_eq!(
            failures[2].error,
            ProviderError::MalformedResponse(MalformedResponse::SegmentsNotArray("a string"))
        );
        // User-facing text is one summary, not the diagnostics.
        assert!(!err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn unsupported_provider_falls_back() {
        let good = Arc::new(MockProvider::new("gemini", MockResponse::text(VALID)));
        let bad = ChainEntry::resolve(
            &ProviderConfig {
                provider: "claude".into(),
                model: "x".into(),
                api_key: "k".into(),
                enabled: true,
            },
            &Endpoints::default(),
        );
        let mut entries = vec![bad];
        entries.extend(chain(&[good.clone()]));

        let analysis = run(&entries).await.unwrap();
        assert_eq!(analysis.provider, "gemini");
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(
            analysis.failures[0].error,
            ProviderError::UnsupportedProvider("claude".into())
        );
        assert_eq!(good.call_count(), 1);
    }

    #[tokio::test]
    async fn rate_limited_then_valid() {
        let first = Arc::new(MockProvider::new("glm", MockResponse::Status(429)));
        let second = Arc::new(MockProvider::new("deepseek", MockResponse::text(VALID)));

        let analysis = run(&chain(&[first.clone(), second.clone()])).await.unwrap();

        let expected = sanitize::parse_response(VALID).unwrap();
        assert_eq!(analysis.result, expected);
        assert_eq!(analysis.provider, "deepseek");
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].provider, "glm");
        assert!(analysis.failures[0].error.is_rate_limited());
    }

    #[tokio::test]
    async fn network_and_timeout_errors_fall_back() {
        let first = Arc::new(MockProvider::new(
            "glm",
            MockResponse::Error(ProviderError::Network("connection refused".into())),
        ));
        let second = Arc::new(MockProvider::new(
            "deepseek",
            MockResponse::Error(ProviderError::Timeout(Duration::from_secs(5))),
        ));
        let third = Arc::new(MockProvider::new("gemini", MockResponse::text(VALID)));

        let analysis = run(&chain(&[first.clone(), second.clone(), third.clone()]))
            .await
            .unwrap();

        assert_eq!(analysis.provider, "gemini");
        assert_eq!(
            analysis.failures[0].error,
            ProviderError::Network("connection refused".into())
        );
        assert_eq!(
            analysis.failures[1].error,
            ProviderError::Timeout(Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn each_analysis_starts_from_the_head_of_the_chain() {
        let flaky = Arc::new(MockProvider::with_sequence(
            "glm",
            vec![
                MockResponse::Error(ProviderError::Network("reset by peer".into())),
                MockResponse::text(VALID),
            ],
        ));
        let backup = Arc::new(MockProvider::new("gemini", MockResponse::text(VALID)));
        let entries = chain(&[flaky.clone(), backup.clone()]);

        let first_run = run(&entries).await.unwrap();
        assert_eq!(first_run.provider, "gemini");

        let second_run = run(&entries).await.unwrap();
        assert_eq!(second_run.provider, "glm");
        assert!(second_run.failures.is_empty());
        assert_eq!(flaky.call_count(), 2);
        assert_eq!(backup.call_count(), 1);
    }

    #[tokio::test]
    async fn same_prompt_sent_to_every_provider() {
        let first = Arc::new(MockProvider::new("glm", MockResponse::text("```json\n{}\n```")));
        let second = Arc::new(MockProvider::new("deepseek", MockResponse::text(VALID)));

        run(&chain(&[first.clone(), second.clone()])).await.unwrap();

        assert_eq!(first.prompts(), vec![prompt()]);
        assert_eq!(second.prompts(), vec![prompt()]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_is_bounded_by_timeout() {
        let slow = Arc::new(
            MockProvider::new("glm", MockResponse::text(VALID)).with_delay(Duration::from_secs(600)),
        );
        let fast = Arc::new(MockProvider::new("gemini", MockResponse::text(VALID)));

        let analysis = run_fallback_chain(
            &chain(&[slow.clone(), fast.clone()]),
            &prompt(),
            &client(),
            Duration::from_secs(30),
            None,
        )
        .await
        .unwrap();

        assert_eq!(analysis.provider, "gemini");
        assert_eq!(
            analysis.failures[0].error,
            ProviderError::Timeout(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn events_follow_attempt_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let events = Arc::clone(&events);
            move |e: ProgressEvent| {
                let tag = match e {
                    ProgressEvent::Attempting { provider, .. } => format!("try:{provider}"),
                    ProgressEvent::AttemptFailed { provider, .. } => format!("fail:{provider}"),
                    ProgressEvent::Succeeded { provider, .. } => format!("ok:{provider}"),
                };
                events.lock().unwrap().push(tag);
            }
        };
        let sink: &(dyn Fn(ProgressEvent) + Send + Sync) = &recorder;
        let mocks = [
            Arc::new(MockProvider::new("glm", MockResponse::Status(500))),
            Arc::new(MockProvider::new("gemini", MockResponse::text(VALID))),
        ];

        run_fallback_chain(
            &chain(&mocks),
            &prompt(),
            &client(),
            Duration::from_secs(5),
            Some(sink),
        )
        .await
        .unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["try:glm", "fail:glm", "try:gemini", "ok:gemini"]
        );
    }

    #[tokio::test]
    async fn orchestrator_without_active_provider_makes_no_calls() {
        let orchestrator = Orchestrator::new(&Config::default());
        let store = vec![ProviderConfig {
            provider: "glm".into(),
            model: String::new(),
            api_key: String::new(),
            enabled: true,
        }];
        let request = AnalysisRequest::new("a paper text long enough", InputMode::Full, &store);
        let err = orchestrator
            .analyze(&request, crate::catalog::default_journal(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoActiveProvider));
    }
}
