//! Deterministic identifier derivation from platform-native strings.

use crate::error::ReverieCoreError;
use uuid::Uuid;

/// Namespace under which all stable ids are derived.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f3b1d6a_52c4_4be1_9d0e_7aa1c64b21f7);

/// Derive a stable UUID from a platform-native raw string.
///
/// The same input always yields the same UUID; distinct inputs yield
/// distinct UUIDs up to hash collision. Empty or whitespace-only input
/// is rejected so callers never silently mint a null identity.
pub fn stable_id(raw: &str) -> Result<Uuid, ReverieCoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReverieCoreError::InvalidInput(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(Uuid::new_v5(&ID_NAMESPACE, trimmed.as_bytes()))
}

/// Derive a memory id from a raw message id and the owning agent.
///
/// Re-ingesting the same raw message for the same agent always maps to
/// the same memory id, which is what makes memory creation idempotent.
pub fn memory_id(raw_message_id: &str, agent_id: Uuid) -> Result<Uuid, ReverieCoreError> {
    let trimmed = raw_message_id.trim();
    if trimmed.is_empty() {
        return Err(ReverieCoreError::InvalidInput(
            "message identifier must not be empty".to_string(),
        ));
    }
    stable_id(&format!("{trimmed}:{agent_id}"))
}
