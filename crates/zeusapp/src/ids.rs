//! ID minting: `<prefix>-<first 8 hex of a fresh UUIDv4>`.

use uuid::Uuid;

use crate::error::{Result, ZeusError};
use crate::model::{EntityId, Kind};

const MAX_MINT_ATTEMPTS: usize = 16;

/// Mint a fresh id for `kind`. `taken` is consulted so an id already present
/// in the store (or retired by a delete) is never handed out again.
pub fn mint(kind: Kind, mut taken: impl FnMut(&EntityId) -> bool) -> Result<EntityId> {
    for _ in 0..MAX_MINT_ATTEMPTS {
        let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
        let id = EntityId::assemble(kind, &suffix);
        if !taken(&id) {
            return Ok(id);
        }
    }
    Err(ZeusError::Internal(format!(
        "could not mint a fresh {} id after {MAX_MINT_ATTEMPTS} attempts",
        kind.name()
    )))
}
