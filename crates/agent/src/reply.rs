use serde::Deserialize;
use thiserror::Error;

use sendmoney_core::domain::transfer::{PromoData, StateUpdate};

/// The model's reply, validated at the boundary before anything touches a session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReply {
    pub agent_response: String,
    pub updated_state: StateUpdate,
    #[serde(default)]
    pub promo: Option<PromoData>,
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("model reply was empty")]
    Empty,
    #[error("model reply does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

pub fn parse_reply(raw: &str) -> Result<ModelReply, ReplyError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(ReplyError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

/// Removes one surrounding Markdown fence (```` ```json ... ``` ````), if present.
fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return raw;
    };
    match inner.split_once('\n') {
        Some((language, body)) if !language.trim_start().starts_with('{') => body.trim(),
        _ => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_reply, ReplyError};

    const REPLY: &str = r#"{
        "agentResponse": "How much would you like to send?",
        "updatedState": {
            "destinationCountry": "Brazil",
            "amount": null,
            "beneficiaryName": null,
            "deliveryMethod": null,
            "isComplete": false
        },
        "promo": null
    }"#;

    #[test]
    fn well_formed_reply_parses() {
        let reply = parse_reply(REPLY).expect("reply");

        assert_eq!(reply.agent_response, "How much would you like to send?");
        assert_eq!(reply.updated_state.destination_country, Some(Some("Brazil".to_string())));
        assert_eq!(reply.updated_state.amount, Some(None));
        assert_eq!(reply.updated_state.is_complete, Some(false));
        assert!(reply.promo.is_none());
    }

    #[test]
    fn partial_state_leaves_absent_fields_unset() {
        let reply = parse_reply(
            r#"{"agentResponse":"ok","updatedState":{"beneficiaryName":"John Smith"}}"#,
        )
        .expect("reply");

        assert_eq!(reply.updated_state.destination_country, None);
        assert_eq!(reply.updated_state.beneficiary_name, Some(Some("John Smith".to_string())));
        assert_eq!(reply.updated_state.is_complete, None);
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let fenced = format!("```json\n{REPLY}\n```");
        assert!(parse_reply(&fenced).is_ok());

        let bare_fence = format!("```{REPLY}```");
        assert!(parse_reply(&bare_fence).is_ok());
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let reply = parse_reply(
            r#"{"agentResponse":"hi","updatedState":{},"promo":null,"reasoning":"n/a"}"#,
        );
        assert!(reply.is_ok());
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(matches!(parse_reply("   "), Err(ReplyError::Empty)));
        assert!(parse_reply("Sure! Which country?").is_err());
        assert!(parse_reply(r#"{"updatedState":{}}"#).is_err());
        assert!(parse_reply(r#"{"agentResponse":"hi"}"#).is_err());
        assert!(parse_reply(r#"{"agentResponse":"hi","updatedState":{"amount":500}}"#).is_err());
        assert!(parse_reply(&format!("{REPLY} trailing")).is_err());
    }

    #[test]
    fn incomplete_promo_is_rejected() {
        let reply = parse_reply(
            r#"{"agentResponse":"done","updatedState":{},"promo":{"title":"Win"}}"#,
        );
        assert!(reply.is_err());
    }
}
