use sendmoney_core::catalog::{
    canonical_country, canonical_method, currency_mismatch, validate_transfer, PROMO_IMAGE_URL,
    PROMO_LINK,
};
use sendmoney_core::domain::transfer::{PromoData, StateUpdate, TransferField, TransferState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    /// The proposal was refused and the prior value kept.
    Deny { reason_code: &'static str, field: Option<TransferField>, detail: String },
    /// The proposal was accepted in a reduced form.
    Degrade { reason_code: &'static str, detail: String },
    /// Accepted as proposed, but worth recording.
    Flag { reason_code: &'static str, detail: String },
}

impl GuardrailDecision {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Deny { reason_code, .. }
            | Self::Degrade { reason_code, .. }
            | Self::Flag { reason_code, .. } => reason_code,
        }
    }
}

/// State and promo after the policy has been applied to a model proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardedTurn {
    pub state: TransferState,
    pub promo: Option<PromoData>,
    pub decisions: Vec<GuardrailDecision>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub reject_catalog_names: bool,
    pub enforce_completion_gate: bool,
    pub require_completion_for_promo: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            reject_catalog_names: true,
            enforce_completion_gate: true,
            require_completion_for_promo: true,
        }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(
        &self,
        previous: &TransferState,
        mut update: StateUpdate,
        promo: Option<PromoData>,
    ) -> GuardedTurn {
        let mut decisions = Vec::new();

        if self.reject_catalog_names {
            if let Some(Some(name)) = update.beneficiary_name.clone() {
                let clash = if canonical_country(&name).is_some() {
                    Some("beneficiary_name_is_country")
                } else if canonical_method(&name).is_some() {
                    Some("beneficiary_name_is_delivery_method")
                } else {
                    None
                };
                if let Some(reason_code) = clash {
                    update.beneficiary_name = None;
                    decisions.push(GuardrailDecision::Deny {
                        reason_code,
                        field: Some(TransferField::BeneficiaryName),
                        detail: format!("`{name}` is not a person's name"),
                    });
                }
            }
        }

        let mut state = previous.merge(&update);

        if self.enforce_completion_gate && state.is_complete {
            let violations = validate_transfer(&state);
            if !violations.is_empty() {
                state.is_complete = false;
                let reasons =
                    violations.iter().map(|violation| violation.reason_code()).collect::<Vec<_>>();
                decisions.push(GuardrailDecision::Degrade {
                    reason_code: "completion_gate_failed",
                    detail: reasons.join(","),
                });
            }
        }

        let mut promo = promo;
        if self.require_completion_for_promo && promo.is_some() && !state.is_complete {
            promo = None;
            decisions.push(GuardrailDecision::Deny {
                reason_code: "promo_without_completion",
                field: None,
                detail: "promo proposed before the transfer was complete".to_string(),
            });
        }

        if let Some(promo) = promo.as_mut() {
            if promo.image_url != PROMO_IMAGE_URL || promo.link != PROMO_LINK {
                promo.image_url = PROMO_IMAGE_URL.to_string();
                promo.link = PROMO_LINK.to_string();
                decisions.push(GuardrailDecision::Degrade {
                    reason_code: "promo_urls_restored",
                    detail: "promo image or link differed from the campaign".to_string(),
                });
            }
        }

        if state.is_complete {
            if let Some((stated, expected)) = currency_mismatch(&state) {
                decisions.push(GuardrailDecision::Flag {
                    reason_code: "currency_mismatch",
                    detail: format!("amount in {stated}, destination pays out in {expected}"),
                });
            }
        }

        GuardedTurn { state, promo, decisions }
    }
}
