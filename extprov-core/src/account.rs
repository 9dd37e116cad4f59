//! Best-effort discovery of the platform account ID.
//!
//! OAuth2 client-credential tokens usually cannot read `/api/users/me`, so
//! discovery falls back to the `account_id` of an existing provider. Every
//! failure along the way is logged and swallowed; the caller gets `None` and
//! may still send a request the remote rejects.

use tracing::{debug, warn};

use crate::model::AccountId;
use crate::provider::ProviderRecord;
use crate::session::HttpVerbs;

/// Profile of the authenticated user.
pub const USER_PROFILE_PATH: &str = "/api/users/me";

/// First page of the provider collection.
pub const FIRST_PROVIDER_PATH: &str = "/api/external_providers?limit=1";

/// Find the account ID from the user profile, else from the first provider.
pub async fn discover_account_id(session: &dyn HttpVerbs) -> Option<AccountId> {
    match account_from_profile(session).await {
        Some(account_id) => {
            debug!("Account ID {} read from user profile", account_id);
            return Some(account_id);
        }
        None => debug!("User profile did not yield an account ID, trying providers"),
    }

    match account_from_providers(session).await {
        Some(account_id) => {
            debug!("Account ID {} read from existing provider", account_id);
            Some(account_id)
        }
        None => {
            warn!("Could not determine account_id automatically");
            None
        }
    }
}

async fn account_from_profile(session: &dyn HttpVerbs) -> Option<AccountId> {
    let profile = session
        .get(USER_PROFILE_PATH)
        .await
        .map_err(|e| debug!("User profile lookup failed: {}", e))
        .ok()?;
    let profile: serde_json::Value = profile.json().ok()?;
    profile.get("account_id").and_then(AccountId::from_json)
}

async fn account_from_providers(session: &dyn HttpVerbs) -> Option<AccountId> {
    let providers = session
        .get(FIRST_PROVIDER_PATH)
        .await
        .map_err(|e| debug!("Provider lookup failed: {}", e))
        .ok()?;
    let providers = ProviderRecord::from_listing(providers.json().ok()?);
    providers.first().and_then(ProviderRecord::account_id)
}
