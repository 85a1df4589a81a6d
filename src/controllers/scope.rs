use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::FeedError;

/// Lifetime of one mounted view. Requests started under a scope are dropped
/// when the scope is cancelled, so their responses never reach a view that
/// has been navigated away from.
#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels everything in flight and starts a fresh scope.
    pub fn remount(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
    }

    pub async fn run<F, T>(&self, fut: F) -> Result<T, FeedError>
    where
        F: Future<Output = Result<T, FeedError>>,
    {
        scoped(&self.token, fut).await
    }
}

pub async fn scoped<F, T>(token: &CancellationToken, fut: F) -> Result<T, FeedError>
where
    F: Future<Output = Result<T, FeedError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!("request dropped with its view");
            Err(FeedError::Cancelled)
        }
        out = fut => out,
    }
}
