//! Modality Detector: assigns image subtypes and pre-selects image analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{ImageClassifier, Specialist, TurnContext, UNKNOWN_SUBTYPE};
use tracing::{debug, warn};

use crate::deadline::with_deadline;
use crate::stage::Stage;

pub struct ModalityDetector {
    classifier: Option<Arc<dyn ImageClassifier>>,
    timeout: Option<Duration>,
}

impl ModalityDetector {
    pub fn new(classifier: Option<Arc<dyn ImageClassifier>>, timeout: Option<Duration>) -> Self {
        Self { classifier, timeout }
    }

    async fn subtype(&self, ctx: &TurnContext) -> String {
        let (Some(classifier), Some(image)) = (&self.classifier, ctx.image_payload()) else {
            return UNKNOWN_SUBTYPE.to_string();
        };

        match with_deadline("image classifier", self.timeout, classifier.classify(image)).await {
            Ok(subtype) => subtype,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Image classification failed");
                UNKNOWN_SUBTYPE.to_string()
            }
        }
    }

    /// Record the image subtype and select image analysis. Text and blocked
    /// turns pass through unchanged.
    pub async fn detect(&self, ctx: TurnContext) -> TurnContext {
        if ctx.is_blocked() || !ctx.is_image() {
            return ctx;
        }

        let subtype = self.subtype(&ctx).await;
        debug!(turn_id = %ctx.turn_id(), subtype = %subtype, "Image modality detected");

        // Every image subtype goes to the same specialist for now.
        ctx.with_image_subtype(subtype)
            .select(Specialist::ImageAnalysisAgent)
    }
}

#[async_trait]
impl Stage for ModalityDetector {
    fn name(&self) -> &'static str {
        "modality_detector"
    }

    async fn run(&self, ctx: TurnContext) -> TurnContext {
        self.detect(ctx).await
    }
}
