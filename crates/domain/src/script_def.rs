//! Stored standalone scripts.
//!
//! Automations reference a script by id; the script body itself is owned by
//! a user and executed by the script engine when the automation fires.

use serde::{Deserialize, Serialize};

use crate::error::{HomesteadError, ValidationError};

/// A user-owned script, addressable by `(owner, id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub code: String,
}

impl Script {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] when the id or owner is empty.
    pub fn validate(&self) -> Result<(), HomesteadError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyScriptId.into());
        }
        if self.owner.is_empty() {
            return Err(ValidationError::EmptyOwner.into());
        }
        Ok(())
    }
}
