use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::commands::classifier::{classify, MSG_WRONG_TOKEN};
use crate::commands::retry::RetryPolicy;
use crate::panel::config::PanelConfig;
use crate::security::token_cache::TokenSource;
use crate::transport::{RemoteCommandRequest, RemoteCommandResult, ReqwestTransport, Transport};
use crate::utils::logging::body_for_log;

pub const MSG_INVALID_CONFIG: &str = "Invalid OP-FW configuration.";

/// Target of the per-attempt diagnostic lines.
pub const LOG_TARGET: &str = "opfw";

/// Sends authenticated requests to a control endpoint, retries failed
/// outcomes and folds every path into a [`RemoteCommandResult`].
#[derive(Debug, Clone)]
pub struct RemoteExecutor<T = ReqwestTransport> {
    transport: T,
    token: TokenSource,
    retry: RetryPolicy,
}

impl RemoteExecutor<ReqwestTransport> {
    pub fn new(token: TokenSource) -> Self {
        Self::with_transport(ReqwestTransport::new(), token)
    }

    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(config.token_source()).with_retry(config.retry_policy())
    }
}

impl<T: Transport> RemoteExecutor<T> {
    pub fn with_transport(transport: T, token: TokenSource) -> Self {
        Self {
            transport,
            token,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one request. Never fails: transport errors and malformed
    /// responses end up as `Failure`.
    pub async fn execute(&self, request: &RemoteCommandRequest) -> RemoteCommandResult {
        let token = match self.token.current().await {
            Some(token) => token,
            None => {
                warn!(route = %request.route, "no bearer token configured, skipping remote call");
                return RemoteCommandResult::failure(MSG_INVALID_CONFIG);
            }
        };

        let span = info_span!("remote_execute", request_id = %Uuid::new_v4());
        self.run_attempts(request, &token).instrument(span).await
    }

    async fn run_attempts(&self, request: &RemoteCommandRequest, token: &str) -> RemoteCommandResult {
        let url = request.url();
        let mut result = RemoteCommandResult::NotExecuted;

        for attempt in 0..self.retry.max_attempts() {
            info!(
                target: LOG_TARGET,
                "Do {} to \"{}\" with data {}",
                request.method,
                url,
                request.params_json()
            );

            let (status, body) = match self.transport.send(request, token).await {
                Ok(resp) => (resp.status_line(), resp.body),
                Err(err) => ("0".to_string(), format!("{:#}", err)),
            };

            info!(target: LOG_TARGET, "{}: {}", status, body_for_log(&body));

            if request.is_text {
                return RemoteCommandResult::success(body, None);
            }

            result = classify(&body);
            if result.is_success() {
                return result;
            }

            if self.retry.stop_on_auth_error && result.message() == MSG_WRONG_TOKEN {
                debug!(url = %url, "token rejected, not retrying");
                return result;
            }

            if self.retry.has_next(attempt) {
                debug!(
                    url = %url,
                    attempt = attempt + 1,
                    delay_ms = self.retry.delay_ms,
                    reason = %result.message(),
                    "remote call failed, retrying"
                );
                sleep(self.retry.delay()).await;
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::security::token_cache::TokenCache;
    use crate::transport::{Method, TransportResponse};
    use anyhow::{anyhow, Result};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays canned outcomes and counts attempts.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<TransportResponse, String>>>,
        fallback: Option<TransportResponse>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<(String, String, String)>>,
    }

    impl ScriptedTransport {
        pub fn always(status: u16, body: &str) -> Self {
            Self {
                fallback: Some(TransportResponse::new(status, body)),
                ..Self::default()
            }
        }

        pub fn then_ok(self, status: u16, body: &str) -> Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Ok(TransportResponse::new(status, body)));
            self
        }

        pub fn then_err(self, err: &str) -> Self {
            self.script.lock().unwrap().push_back(Err(err.to_string()));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// (method, url, query) of every attempt
        pub fn requests(&self) -> Vec<(String, String, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RemoteCommandRequest, _token: &str) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let query = request
                .query_pairs()
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            self.seen
                .lock()
                .unwrap()
                .push((request.method.to_string(), request.url(), query));

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(resp)) => Ok(resp),
                Some(Err(e)) => Err(anyhow!(e)),
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| anyhow!("connection refused")),
            }
        }
    }

    fn executor(transport: ScriptedTransport) -> RemoteExecutor<ScriptedTransport> {
        RemoteExecutor::with_transport(transport, TokenSource::fixed("secret"))
    }

    fn kick_request() -> RemoteCommandRequest {
        RemoteCommandRequest::new("", "http://localhost/execute/kickPlayer")
            .method(Method::Post)
            .param("licenseIdentifier", "abc")
            .timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn missing_token_short_circuits_without_network() {
        let exec = RemoteExecutor::with_transport(
            ScriptedTransport::always(200, r#"{"statusCode":200}"#),
            TokenSource::Cached(TokenCache::empty()),
        );

        let result = exec.execute(&kick_request()).await;
        assert_eq!(result, RemoteCommandResult::failure("Invalid OP-FW configuration."));
        assert_eq!(exec.transport().calls(), 0);
    }

    #[tokio::test]
    async fn kick_succeeds_after_one_attempt() {
        let exec = executor(ScriptedTransport::default().then_ok(200, r#"{"statusCode":200,"message":"kicked"}"#));

        let result = exec.execute(&kick_request()).await;
        assert_eq!(result, RemoteCommandResult::success("Success: kicked", None));
        assert_eq!(exec.transport().calls(), 1);

        let seen = exec.transport().requests();
        assert_eq!(seen[0].0, "POST");
        assert_eq!(seen[0].1, "http://localhost/execute/kickPlayer");
        assert_eq!(seen[0].2, "licenseIdentifier=abc");
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_uses_full_budget_with_one_delay() {
        let exec = executor(ScriptedTransport::always(500, r#"{"statusCode":500}"#));

        let start = Instant::now();
        let result = exec.execute(&kick_request()).await;
        let elapsed = start.elapsed();

        assert_eq!(exec.transport().calls(), 2);
        assert!(result.message().contains("Unknown server response 500"));
        assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(4), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_transport_error() {
        let exec = executor(
            ScriptedTransport::default()
                .then_err("operation timed out")
                .then_ok(200, r#"{"statusCode":200,"data":{"queue":[]}}"#),
        );

        let result = exec.execute(&kick_request()).await;
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&serde_json::json!({"queue": []})));
        assert_eq!(exec.transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_become_json_failures() {
        let exec = executor(ScriptedTransport::default().then_err("connection refused").then_err("connection refused"));

        let result = exec.execute(&kick_request()).await;
        assert_eq!(
            result,
            RemoteCommandResult::failure(
                "Failed to execute route: \"Invalid response json: Syntax error, malformed JSON\""
            )
        );
        assert_eq!(exec.transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_401_consumes_budget_by_default() {
        let exec = executor(ScriptedTransport::always(401, r#"{"statusCode":401}"#));

        let result = exec.execute(&kick_request()).await;
        assert!(result.message().contains("Wrong token"));
        assert_eq!(exec.transport().calls(), 2);
    }

    #[tokio::test]
    async fn auth_short_circuit_is_opt_in() {
        let exec = executor(ScriptedTransport::always(401, r#"{"statusCode":401}"#))
            .with_retry(RetryPolicy::default().stop_on_auth_error(true));

        let result = exec.execute(&kick_request()).await;
        assert!(result.message().contains("Wrong token"));
        assert_eq!(exec.transport().calls(), 1);
    }

    #[tokio::test]
    async fn text_mode_returns_raw_body_on_first_attempt() {
        let exec = executor(ScriptedTransport::always(500, "not json at all"));
        let req = RemoteCommandRequest::new("https://c1.example.net/op-framework/", "crafting.txt")
            .method(Method::Get)
            .text();

        let result = exec.execute(&req).await;
        assert_eq!(result, RemoteCommandResult::success("not json at all", None));
        assert_eq!(exec.transport().calls(), 1);
    }

    #[tokio::test]
    async fn text_mode_wraps_transport_error_message() {
        let exec = executor(ScriptedTransport::default().then_err("dns error"));
        let req = RemoteCommandRequest::new("", "https://c1.example.net/crafting.txt").text();

        let result = exec.execute(&req).await;
        assert!(result.is_success());
        assert_eq!(result.message(), "dns error");
        assert_eq!(exec.transport().calls(), 1);
    }

    #[tokio::test]
    async fn control_bytes_in_response_are_tolerated() {
        let exec = executor(ScriptedTransport::default().then_ok(200, "{\"statusCode\":200,\u{1}\"message\":\"ok\"}"));

        let result = exec.execute(&kick_request()).await;
        assert_eq!(result, RemoteCommandResult::success("Success: ok", None));
        assert_eq!(exec.transport().calls(), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let exec = executor(ScriptedTransport::always(404, r#"{"statusCode":404,"message":"Unknown player"}"#))
            .with_retry(RetryPolicy::no_retry());

        let result = exec.execute(&kick_request()).await;
        assert_eq!(result, RemoteCommandResult::failure("Unknown player"));
        assert_eq!(exec.transport().calls(), 1);
    }

    /// Collects the formatted message of every `opfw` event.
    #[derive(Clone, Default)]
    struct LineCollector(std::sync::Arc<Mutex<Vec<String>>>);

    struct MessageVisitor(Option<String>);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LineCollector {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if event.metadata().target() != LOG_TARGET {
                return;
            }
            let mut visitor = MessageVisitor(None);
            event.record(&mut visitor);
            if let Some(line) = visitor.0 {
                self.0.lock().unwrap().push(line);
            }
        }
    }

    #[tokio::test]
    async fn logs_request_and_response_lines_per_attempt() {
        use tracing_subscriber::layer::SubscriberExt;

        let collector = LineCollector::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector.clone()));

        let exec = executor(
            ScriptedTransport::default()
                .then_err("connection refused")
                .then_ok(500, &"x".repeat(400)),
        )
        .with_retry(RetryPolicy::new(2, Duration::ZERO));

        let result = exec.execute(&kick_request()).await;
        assert!(!result.is_success());

        let lines = collector.0.lock().unwrap().clone();
        assert_eq!(lines.len(), 4, "{:#?}", lines);
        assert_eq!(
            lines[0],
            r#"Do POST to "http://localhost/execute/kickPlayer" with data {"licenseIdentifier":"abc"}"#
        );
        assert!(lines[1].starts_with("0: connection refused"), "{}", lines[1]);
        assert_eq!(lines[2], lines[0]);
        assert_eq!(lines[3], format!("500 Internal Server Error: {}...", "x".repeat(150)));
    }
}
