use std::sync::Arc;

use serde_json::json;

use sendmoney_core::domain::session::{SessionSnapshot, IS_COMPLETE_KEY, PROMO_KEY};
use sendmoney_core::domain::transfer::TransferState;
use sendmoney_db::{
    connect_with_settings, migrations, FieldChange, InMemorySessionRepository, SessionRepository,
    SqlSessionRepository,
};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err(format!(
                        "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                        left, right
                    ));
                }
            }
        }
    };
}

async fn backends() -> ContractResult<Vec<(&'static str, Arc<dyn SessionRepository>)>> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;

    Ok(vec![
        ("memory", Arc::new(InMemorySessionRepository::new()) as Arc<dyn SessionRepository>),
        ("sqlite", Arc::new(SqlSessionRepository::new(pool)) as Arc<dyn SessionRepository>),
    ])
}

fn brazil_state() -> TransferState {
    TransferState {
        destination_country: Some("Brazil".to_string()),
        amount: Some("500 BRL".to_string()),
        beneficiary_name: Some("John Smith".to_string()),
        delivery_method: Some("Bank Deposit".to_string()),
        is_complete: true,
    }
}

async fn committed_turn_round_trips(name: &str, repo: &dyn SessionRepository) -> ContractResult {
    let session_id = format!("{name}-turn");
    let fields = repo.load_or_create(&session_id).await.map_err(|e| e.to_string())?;
    require!(fields.is_empty(), "{name}: new session should be empty");

    let state = brazil_state();
    let promo = sendmoney_core::catalog::default_promo();
    let mut changes = SessionSnapshot::state_entries(&state)
        .into_iter()
        .map(|(key, value)| FieldChange::set(key, value))
        .collect::<Vec<_>>();
    changes.push(FieldChange::set(
        PROMO_KEY,
        SessionSnapshot::promo_entry(&promo).map_err(|e| e.to_string())?,
    ));
    repo.write_fields(&session_id, &changes).await.map_err(|e| e.to_string())?;

    let stored = repo
        .get(&session_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("{name}: session should exist after commit"))?;
    let snapshot = SessionSnapshot::from_fields(&stored).map_err(|e| e.to_string())?;
    require_eq!(snapshot.state, state);
    require_eq!(snapshot.promo, Some(promo));

    repo.write_fields(&session_id, &[FieldChange::delete(PROMO_KEY)])
        .await
        .map_err(|e| e.to_string())?;
    let stored = repo
        .get(&session_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("{name}: session should still exist"))?;
    require!(!stored.contains_key(PROMO_KEY), "{name}: promo should be gone after the next turn");
    require_eq!(stored.get(IS_COMPLETE_KEY), Some(&json!(true)));

    Ok(())
}

async fn identifiers_do_not_share_state(name: &str, repo: &dyn SessionRepository) -> ContractResult {
    let left = format!("{name}-left");
    let right = format!("{name}-right");

    repo.set(&left, "destinationCountry", json!("Japan")).await.map_err(|e| e.to_string())?;
    repo.set(&right, "destinationCountry", json!("Mexico")).await.map_err(|e| e.to_string())?;

    let left_fields = repo.get(&left).await.map_err(|e| e.to_string())?.unwrap_or_default();
    let right_fields = repo.get(&right).await.map_err(|e| e.to_string())?.unwrap_or_default();
    require_eq!(left_fields.get("destinationCountry"), Some(&json!("Japan")));
    require_eq!(right_fields.get("destinationCountry"), Some(&json!("Mexico")));

    Ok(())
}

#[tokio::test]
async fn every_backend_honours_the_session_contract() -> ContractResult {
    for (name, repo) in backends().await? {
        repo.ping().await.map_err(|e| format!("{name}: ping failed: {e}"))?;
        committed_turn_round_trips(name, repo.as_ref()).await?;
        identifiers_do_not_share_state(name, repo.as_ref()).await?;
    }
    Ok(())
}
