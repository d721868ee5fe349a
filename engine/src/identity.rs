use types::CoupleId;

use crate::EngineError;

/// Places a couple id may come from, checked in order.
#[derive(Clone, Debug, Default)]
pub struct IdentitySources {
    pub cached_identity: Option<String>,
    pub cached_couple_id: Option<String>,
    pub in_memory_couple_id: Option<String>,
}

impl IdentitySources {
    /// Sources with only the in-memory couple id set.
    pub fn paired(couple_id: impl Into<String>) -> Self {
        Self {
            in_memory_couple_id: Some(couple_id.into()),
            ..Default::default()
        }
    }

    /// First non-empty couple id wins.
    pub fn resolve(&self) -> Result<CoupleId, EngineError> {
        [
            &self.cached_identity,
            &self.cached_couple_id,
            &self.in_memory_couple_id,
        ]
        .into_iter()
        .flatten()
        .map(|raw| raw.trim())
        .find(|raw| !raw.is_empty())
        .map(CoupleId::new)
        .ok_or(EngineError::NotPaired)
    }
}
