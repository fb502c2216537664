//! Operation context: the cancellation token every public operation takes.
//!
//! Cancellation points sit before lock acquisition, before each file touch,
//! at the top of entity-set iterations, and before each bus publish. A
//! cancelled operation unwinds through `?`; lock guards release on drop, so
//! no partial events are published and no locks leak.

use tokio_util::sync::CancellationToken;

use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Default)]
pub struct OpCtx {
    cancel: CancellationToken,
}

impl OpCtx {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bail out with `Cancelled` when the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ZeusError::Cancelled)
        } else {
            Ok(())
        }
    }
}
