//! The pipeline stage abstraction.

use async_trait::async_trait;
use asclepius_common::TurnContext;

/// One step of the routing pipeline.
///
/// A stage takes ownership of the full turn context and returns the next
/// version of it. Stages never fail: collaborator errors are turned into
/// context updates before returning.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: TurnContext) -> TurnContext;
}
