//! Logical layout of a stored session.
//!
//! A session is a flat map of JSON values keyed by the transfer field names plus
//! `isComplete` and the transient `promo` key, which holds a serialized [`PromoData`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::domain::transfer::{PromoData, TransferField, TransferState};
use crate::errors::DomainError;

pub type SessionFields = BTreeMap<String, Value>;

pub const IS_COMPLETE_KEY: &str = "isComplete";
pub const PROMO_KEY: &str = "promo";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: TransferState,
    pub promo: Option<PromoData>,
}

impl SessionSnapshot {
    pub fn from_fields(fields: &SessionFields) -> Result<Self, DomainError> {
        let mut object = Map::new();
        for field in TransferField::ALL {
            if let Some(value) = fields.get(field.key()) {
                object.insert(field.key().to_string(), value.clone());
            }
        }
        if let Some(value) = fields.get(IS_COMPLETE_KEY) {
            object.insert(IS_COMPLETE_KEY.to_string(), value.clone());
        }

        let state: TransferState = serde_json::from_value(Value::Object(object)).map_err(|error| {
            DomainError::InvariantViolation(format!("stored transfer state is corrupt: {error}"))
        })?;

        let promo = match fields.get(PROMO_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(serde_json::from_str(raw).map_err(|error| {
                DomainError::InvariantViolation(format!("stored promo is corrupt: {error}"))
            })?),
            Some(other) => {
                return Err(DomainError::InvariantViolation(format!(
                    "stored promo must be a serialized string, found {other}"
                )))
            }
        };

        Ok(Self { state, promo })
    }

    /// Whether any transfer field has ever been written to this session.
    pub fn has_transfer_fields(fields: &SessionFields) -> bool {
        TransferField::ALL.iter().any(|field| fields.contains_key(field.key()))
            || fields.contains_key(IS_COMPLETE_KEY)
    }

    /// Key/value pairs for the transfer state, in storage form.
    pub fn state_entries(state: &TransferState) -> Vec<(String, Value)> {
        let mut entries = TransferField::ALL
            .into_iter()
            .map(|field| {
                let value = state.field(field).map(|raw| Value::String(raw.to_string()));
                (field.key().to_string(), value.unwrap_or(Value::Null))
            })
            .collect::<Vec<_>>();
        entries.push((IS_COMPLETE_KEY.to_string(), Value::Bool(state.is_complete)));
        entries
    }

    pub fn promo_entry(promo: &PromoData) -> Result<Value, DomainError> {
        serde_json::to_string(promo).map(Value::String).map_err(|error| {
            DomainError::InvariantViolation(format!("promo could not be serialized: {error}"))
        })
    }
}
