//! Per-page model call with retry.
//!
//! This module turns an encoded page into a [`PageResult`]. All prompt text
//! lives in [`crate::prompts`] and all HTTP in [`crate::client`]; what stays
//! here is the decision of what to do when a call fails.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx responses from hosted inference APIs come and go.
//! Transient failures are retried up to `max_attempts` calls in total, with
//! an exponential delay (`retry_initial_delay_ms × 2^(retry-1)`, capped at
//! `retry_max_delay_ms`). With the defaults the waits are 4 s then 8 s.
//!
//! * transient ([`ClientError::is_transient`]) → wait, try again
//! * rejected (4xx other than auth) → page fails at once
//! * auth (401/403) → returned as `Err`; the caller aborts the whole run

use crate::client::{ExtractionClient, PageRequest};
use crate::config::ExtractionConfig;
use crate::error::{ClientError, PageError};
use crate::output::PageResult;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::{page_instruction, EXTRACTION_PROMPT};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Assemble the request for page `page_num` from the run configuration.
pub fn build_request(page_num: usize, image: EncodedImage, config: &ExtractionConfig) -> PageRequest {
    PageRequest {
        page_num,
        image,
        system_prompt: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
        user_prompt: page_instruction(page_num),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Send `request`, retrying transient failures.
///
/// Page-level failures come back as `Ok` with [`PageResult::error`] set so one
/// bad page does not sink the document. `Err` is reserved for
/// [`ClientError::Auth`], which no other page will get past either.
pub async fn process_page(
    client: &dyn ExtractionClient,
    request: &PageRequest,
    config: &ExtractionConfig,
) -> Result<PageResult, ClientError> {
    let page_num = request.page_num;
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);

    let mut attempts = 0;
    let mut last_err: Option<ClientError> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = config.retry_delay(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num,
                attempt - 1,
                max_attempts - 1,
                delay.as_millis()
            );
            sleep(delay).await;
        }
        attempts = attempt;

        match client.extract_page(request).await {
            Ok(completion) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, completion.prompt_tokens, completion.completion_tokens, duration
                );
                return Ok(PageResult {
                    page_num,
                    text: completion.text,
                    attempts,
                    duration_ms: duration.as_millis() as u64,
                    input_tokens: completion.prompt_tokens,
                    output_tokens: completion.completion_tokens,
                    error: None,
                });
            }
            Err(e @ ClientError::Auth { .. }) => return Err(e),
            Err(e) if e.is_transient() => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt, e);
                last_err = Some(e);
            }
            Err(e) => {
                warn!("Page {}: rejected, not retrying: {}", page_num, e);
                last_err = Some(e);
                break;
            }
        }
    }

    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());

    Ok(PageResult::failed(
        page_num,
        attempts,
        start.elapsed().as_millis() as u64,
        PageError::ExtractionFailed {
            page: page_num,
            attempts,
            detail,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Completion;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a fixed script, one entry per call.
    struct Scripted {
        replies: Mutex<VecDeque<Result<Completion, ClientError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Completion, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ExtractionClient for Scripted {
        async fn extract_page(&self, _request: &PageRequest) -> Result<Completion, ClientError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transient("script exhausted".into())))
        }

        async fn verify(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn ok(text: &str) -> Result<Completion, ClientError> {
        Ok(Completion {
            text: text.into(),
            prompt_tokens: 10,
            completion_tokens: 2,
        })
    }

    fn request(config: &ExtractionConfig) -> PageRequest {
        let image = EncodedImage {
            base64: "QQ==".into(),
            mime_type: "image/jpeg".into(),
        };
        build_request(1, image, config)
    }

    #[test]
    fn request_uses_default_prompt_and_page_instruction() {
        let config = ExtractionConfig::default();
        let req = request(&config);
        assert_eq!(req.system_prompt, EXTRACTION_PROMPT);
        assert_eq!(req.user_prompt, "Extract text from page 1.");
        assert_eq!(req.max_tokens, 4096);
    }

    #[test]
    fn custom_system_prompt_wins() {
        let config = ExtractionConfig::builder()
            .system_prompt("Only digits.")
            .build()
            .unwrap();
        assert_eq!(request(&config).system_prompt, "Only digits.");
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_try() {
        let config = ExtractionConfig::default();
        let client = Scripted::new(vec![ok("hello")]);
        let result = process_page(&client, &request(&config), &config).await.unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.attempts, 1);
        assert_eq!((result.input_tokens, result.output_tokens), (10, 2));
        assert!(result.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_is_not_retried() {
        let config = ExtractionConfig::default();
        let client = Scripted::new(vec![Err(ClientError::from_status(400, "bad image"))]);
        let result = process_page(&client, &request(&config), &config).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert!(matches!(
            result.error,
            Some(PageError::ExtractionFailed { attempts: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_isolate_the_page() {
        let config = ExtractionConfig::default();
        let client = Scripted::new(vec![
            Err(ClientError::from_status(503, "busy")),
            Err(ClientError::Timeout { secs: 60 }),
            Err(ClientError::from_status(502, "gateway")),
        ]);
        let result = process_page(&client, &request(&config), &config).await.unwrap();
        assert_eq!(client.calls(), 3);
        assert_eq!(result.attempts, 3);
        match result.error {
            Some(PageError::ExtractionFailed { page, attempts, detail }) => {
                assert_eq!((page, attempts), (1, 3));
                assert!(detail.contains("502"), "got: {detail}");
            }
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn auth_aborts_without_retry() {
        let config = ExtractionConfig::default();
        let client = Scripted::new(vec![Err(ClientError::from_status(401, "bad key")), ok("x")]);
        let err = process_page(&client, &request(&config), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth { status: 401, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_config_never_sleeps() {
        let config = ExtractionConfig::builder().max_attempts(1).build().unwrap();
        let client = Scripted::new(vec![Err(ClientError::Transient("reset".into()))]);
        let before = tokio::time::Instant::now();
        let result = process_page(&client, &request(&config), &config).await.unwrap();
        assert!(result.error.is_some());
        assert_eq!(before.elapsed(), std::time::Duration::ZERO);
    }
}
