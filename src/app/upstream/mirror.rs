//! Mirror reselection hook

use std::fmt::Debug;

use async_trait::async_trait;
use url::Url;

/// Asked to choose another mirror when one answers with a failure status
///
/// Ranking mirrors is outside the engine. Implementations only need to make
/// the next resolution of a resource's URI point somewhere else.
#[async_trait]
pub trait MirrorSelector: Send + Sync + Debug {
    async fn reselect(&self, failed: &Url, status: u16);
}

/// Selector for a single fixed mirror
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirrorSelector;

#[async_trait]
impl MirrorSelector for NoopMirrorSelector {
    async fn reselect(&self, failed: &Url, status: u16) {
        tracing::debug!(
            "No alternative mirror for {} after HTTP {}",
            failed.host_str().unwrap_or("unknown host"),
            status
        );
    }
}
