//! Safety Gate: rejects unsafe text before any specialist runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{SafetyClassifier, SafetyVerdict, TurnContext};
use tracing::{debug, error, info};

use crate::deadline::with_deadline;
use crate::stage::Stage;

pub struct SafetyGate {
    classifier: Arc<dyn SafetyClassifier>,
    timeout: Option<Duration>,
    unavailable_message: String,
}

impl SafetyGate {
    pub fn new(
        classifier: Arc<dyn SafetyClassifier>,
        timeout: Option<Duration>,
        unavailable_message: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            timeout,
            unavailable_message: unavailable_message.into(),
        }
    }

    /// Classify `text`. An unreachable classifier counts as unsafe.
    pub async fn check(&self, text: &str) -> SafetyVerdict {
        match with_deadline("safety classifier", self.timeout, self.classifier.classify(text)).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(error = %e, "Safety classifier unavailable, blocking turn");
                SafetyVerdict::Unsafe {
                    message: self.unavailable_message.clone(),
                }
            }
        }
    }
}

#[async_trait]
impl Stage for SafetyGate {
    fn name(&self) -> &'static str {
        "safety_gate"
    }

    async fn run(&self, ctx: TurnContext) -> TurnContext {
        if ctx.is_blocked() {
            return ctx;
        }

        // Image turns are not screened here.
        if ctx.is_image() {
            debug!(turn_id = %ctx.turn_id(), "Image input skips safety check");
            return ctx.clear_safety();
        }

        match self.check(ctx.input()).await {
            SafetyVerdict::Safe => ctx.clear_safety(),
            SafetyVerdict::Unsafe { message } => {
                info!(turn_id = %ctx.turn_id(), "Input blocked by safety gate");
                ctx.block(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asclepius_common::{AgentSelection, AsclepiusError, Result, Transcript};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier {
        verdict: Option<SafetyVerdict>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(verdict: Option<SafetyVerdict>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SafetyClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<SafetyVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.verdict
                .clone()
                .ok_or_else(|| AsclepiusError::Safety("classifier offline".into()))
        }
    }

    fn gate(classifier: Arc<FixedClassifier>, timeout: Option<Duration>) -> SafetyGate {
        SafetyGate::new(classifier, timeout, "unavailable")
    }

    #[tokio::test]
    async fn safe_input_is_cleared_and_untouched() {
        let ctx = gate(FixedClassifier::new(Some(SafetyVerdict::Safe)), None)
            .run(TurnContext::text("What is asthma?", Transcript::new()))
            .await;

        assert!(ctx.safety_cleared());
        assert!(ctx.selected_agent().is_none());
        assert!(ctx.transcript().is_empty());
        assert!(ctx.involved_agents().is_empty());
    }

    #[tokio::test]
    async fn unsafe_input_is_blocked_with_message() {
        let verdict = SafetyVerdict::Unsafe {
            message: "I can't help with that.".into(),
        };
        let ctx = gate(FixedClassifier::new(Some(verdict)), None)
            .run(TurnContext::text("how to poison someone", Transcript::new()))
            .await;

        assert_eq!(ctx.selected_agent(), Some(&AgentSelection::Blocked));
        assert_eq!(ctx.response_text(), Some("I can't help with that."));
        assert!(!ctx.safety_cleared());
        assert_eq!(ctx.transcript().len(), 1);
    }

    #[tokio::test]
    async fn image_turn_skips_classifier() {
        let classifier = FixedClassifier::new(Some(SafetyVerdict::Safe));
        let ctx = gate(classifier.clone(), None)
            .run(TurnContext::image("", Some(vec![1]), Transcript::new()))
            .await;

        assert!(ctx.safety_cleared());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn classifier_error_fails_closed() {
        let ctx = gate(FixedClassifier::new(None), None)
            .run(TurnContext::text("hello", Transcript::new()))
            .await;

        assert!(ctx.is_blocked());
        assert_eq!(ctx.response_text(), Some("unavailable"));
    }

    #[tokio::test]
    async fn classifier_timeout_fails_closed() {
        let classifier = Arc::new(FixedClassifier {
            verdict: Some(SafetyVerdict::Safe),
            delay: Some(Duration::from_secs(5)),
            calls: AtomicUsize::new(0),
        });
        let ctx = gate(classifier, Some(Duration::from_millis(20)))
            .run(TurnContext::text("hello", Transcript::new()))
            .await;

        assert!(ctx.is_blocked());
    }
}
