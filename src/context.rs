use std::future::Future;

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{KmsError, KmsResult, RpcError};

/// Deadline and cancellation attached to a remote call by the caller.
///
/// The adapters add no timeout policy of their own; whatever is set here is
/// applied to each remote call made on the caller's behalf.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl CallContext {
    /// No deadline, never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Drives one remote call under this context.
    pub(crate) async fn run<T, F>(&self, operation: &'static str, call: F) -> KmsResult<T>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(KmsError::Cancelled { operation }),
            _ = expired => Err(KmsError::DeadlineExceeded { operation }),
            result = call => result.map_err(KmsError::rpc(operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_passes_results_through() {
        let ctx = CallContext::background();
        let ok = ctx.run("Encrypt", async { Ok::<_, RpcError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = ctx
            .run("Encrypt", async {
                Err::<(), _>(RpcError::Rejected {
                    code: 500,
                    status: "INTERNAL".into(),
                    message: "Internal error".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, KmsError::Rpc { operation: "Encrypt", .. }));
    }

    #[tokio::test]
    async fn cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::background().with_cancellation(token);
        assert!(ctx.is_cancelled());

        let err = ctx
            .run("Decrypt", std::future::pending::<Result<(), RpcError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, KmsError::Cancelled { operation: "Decrypt" }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(50));
        let err = ctx
            .run("AsymmetricSign", std::future::pending::<Result<(), RpcError>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KmsError::DeadlineExceeded {
                operation: "AsymmetricSign"
            }
        ));
    }
}
