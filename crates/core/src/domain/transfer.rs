use serde::{Deserialize, Deserializer, Serialize};

/// The four fields a transfer request needs before it can be confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferField {
    DestinationCountry,
    Amount,
    BeneficiaryName,
    DeliveryMethod,
}

impl TransferField {
    pub const ALL: [TransferField; 4] = [
        TransferField::DestinationCountry,
        TransferField::Amount,
        TransferField::BeneficiaryName,
        TransferField::DeliveryMethod,
    ];

    /// Wire and storage key for the field.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DestinationCountry => "destinationCountry",
            Self::Amount => "amount",
            Self::BeneficiaryName => "beneficiaryName",
            Self::DeliveryMethod => "deliveryMethod",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferState {
    pub destination_country: Option<String>,
    pub amount: Option<String>,
    pub beneficiary_name: Option<String>,
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
}

impl TransferState {
    pub fn field(&self, field: TransferField) -> Option<&str> {
        match field {
            TransferField::DestinationCountry => self.destination_country.as_deref(),
            TransferField::Amount => self.amount.as_deref(),
            TransferField::BeneficiaryName => self.beneficiary_name.as_deref(),
            TransferField::DeliveryMethod => self.delivery_method.as_deref(),
        }
    }

    fn field_mut(&mut self, field: TransferField) -> &mut Option<String> {
        match field {
            TransferField::DestinationCountry => &mut self.destination_country,
            TransferField::Amount => &mut self.amount,
            TransferField::BeneficiaryName => &mut self.beneficiary_name,
            TransferField::DeliveryMethod => &mut self.delivery_method,
        }
    }

    pub fn set_field(&mut self, field: TransferField, value: Option<String>) {
        *self.field_mut(field) = normalize(value);
    }

    /// No field captured and not complete.
    pub fn is_empty(&self) -> bool {
        !self.is_complete && TransferField::ALL.iter().all(|field| self.field(*field).is_none())
    }

    pub fn missing_fields(&self) -> Vec<TransferField> {
        TransferField::ALL.into_iter().filter(|field| self.field(*field).is_none()).collect()
    }

    pub fn has_all_fields(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fields whose value differs between `self` and `other`.
    pub fn changed_fields(&self, other: &TransferState) -> Vec<TransferField> {
        TransferField::ALL.into_iter().filter(|field| self.field(*field) != other.field(*field)).collect()
    }

    /// Applies a model-proposed update. Fields the update does not mention keep their
    /// current value; fields it mentions are replaced, including with `null`.
    pub fn merge(&self, update: &StateUpdate) -> TransferState {
        let mut merged = self.clone();
        for field in TransferField::ALL {
            if let Some(value) = update.field(field) {
                merged.set_field(field, value.clone());
            }
        }
        if let Some(is_complete) = update.is_complete {
            merged.is_complete = is_complete;
        }
        merged
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|trimmed| !trimmed.is_empty())
}

/// `updatedState` as proposed by the model. Each string field distinguishes an absent key
/// (`None`) from an explicit `null` (`Some(None)`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    #[serde(default, deserialize_with = "present")]
    pub destination_country: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub amount: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub beneficiary_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub delivery_method: Option<Option<String>>,
    #[serde(default)]
    pub is_complete: Option<bool>,
}

impl StateUpdate {
    pub fn field(&self, field: TransferField) -> Option<&Option<String>> {
        match field {
            TransferField::DestinationCountry => self.destination_country.as_ref(),
            TransferField::Amount => self.amount.as_ref(),
            TransferField::BeneficiaryName => self.beneficiary_name.as_ref(),
            TransferField::DeliveryMethod => self.delivery_method.as_ref(),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoData {
    pub image_url: String,
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub link: String,
    pub footer: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{StateUpdate, TransferField, TransferState};

    fn state(country: Option<&str>, name: Option<&str>) -> TransferState {
        TransferState {
            destination_country: country.map(str::to_string),
            beneficiary_name: name.map(str::to_string),
            ..TransferState::default()
        }
    }

    #[test]
    fn merge_preserves_fields_absent_from_update() {
        let current = state(None, Some("John Doe"));
        let update: StateUpdate =
            serde_json::from_value(json!({ "destinationCountry": "France" })).expect("update");

        let merged = current.merge(&update);

        assert_eq!(merged.destination_country.as_deref(), Some("France"));
        assert_eq!(merged.beneficiary_name.as_deref(), Some("John Doe"));
        assert!(!merged.is_complete);
    }

    #[test]
    fn explicit_null_clears_field() {
        let current = state(Some("Brazil"), Some("Ana Silva"));
        let update: StateUpdate =
            serde_json::from_value(json!({ "beneficiaryName": null })).expect("update");

        let merged = current.merge(&update);

        assert_eq!(merged.destination_country.as_deref(), Some("Brazil"));
        assert_eq!(merged.beneficiary_name, None);
    }

    #[test]
    fn blank_strings_are_treated_as_missing() {
        let update: StateUpdate =
            serde_json::from_value(json!({ "amount": "   " })).expect("update");

        let merged = TransferState::default().merge(&update);

        assert_eq!(merged.amount, None);
        assert!(merged.is_empty());
    }

    #[test]
    fn all_null_update_is_a_reset() {
        let update: StateUpdate = serde_json::from_value(json!({
            "destinationCountry": null,
            "amount": null,
            "beneficiaryName": null,
            "deliveryMethod": null,
            "isComplete": false
        }))
        .expect("update");
        let current = TransferState {
            destination_country: Some("Canada".to_string()),
            amount: Some("50 CAD".to_string()),
            beneficiary_name: Some("Jane Roe".to_string()),
            delivery_method: Some("Cash Pickup".to_string()),
            is_complete: true,
        };

        assert_eq!(current.merge(&update), TransferState::default());
        assert_eq!(current.merge(&StateUpdate::default()).amount.as_deref(), Some("50 CAD"));
    }

    #[test]
    fn state_serializes_with_camel_case_nulls() {
        let value = serde_json::to_value(state(Some("Brazil"), None)).expect("serialize");

        assert_eq!(
            value,
            json!({
                "destinationCountry": "Brazil",
                "amount": null,
                "beneficiaryName": null,
                "deliveryMethod": null,
                "isComplete": false
            })
        );
    }

    #[test]
    fn missing_fields_follow_declaration_order() {
        let missing = state(Some("Japan"), None).missing_fields();
        assert_eq!(
            missing,
            vec![TransferField::Amount, TransferField::BeneficiaryName, TransferField::DeliveryMethod]
        );
    }
}
