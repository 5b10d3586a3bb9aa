//! Subscription tier registry and tier changes.
//!
//! The built-in tiers live in `tiers.toml`, embedded at compile time. A
//! deployment may replace them wholesale with its own file of the same
//! shape (see [`TierRegistry::from_file`]).

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use scribe_db::models::User;
use scribe_db::queries::users;

use crate::quota::reset_period;

/// One purchasable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    pub tier_id: String,
    pub display_name: String,
    pub description: String,
    /// Generation calls allowed per reset period.
    pub api_calls: i32,
}

/// Errors from tier lookups and tier changes.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("Invalid subscription tier: {tier}. Valid tiers are: {}", valid.join(", "))]
    InvalidTier { tier: String, valid: Vec<String> },

    #[error("invalid tier configuration: {0}")]
    InvalidConfig(String),

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct TierFile {
    default_tier: String,
    tiers: Vec<SubscriptionTier>,
}

static TIERS_TOML: &str = include_str!("tiers.toml");

/// Read-only tier table, shared process-wide after startup.
#[derive(Debug, Clone)]
pub struct TierRegistry {
    tiers: Vec<SubscriptionTier>,
    default_tier: String,
}

impl TierRegistry {
    /// The tiers shipped with the binary: free, basic and premium.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `tiers.toml` is malformed.
    pub fn builtin() -> Self {
        Self::from_toml_str(TIERS_TOML).expect("embedded tiers.toml is invalid")
    }

    /// Parse and validate a tier file.
    pub fn from_toml_str(content: &str) -> Result<Self, TierError> {
        let file: TierFile =
            toml::from_str(content).map_err(|e| TierError::InvalidConfig(e.to_string()))?;

        if file.tiers.is_empty() {
            return Err(TierError::InvalidConfig("no tiers defined".to_string()));
        }

        let mut seen = HashSet::new();
        for tier in &file.tiers {
            if !seen.insert(tier.tier_id.as_str()) {
                return Err(TierError::InvalidConfig(format!(
                    "duplicate tier id {:?}",
                    tier.tier_id
                )));
            }
            if tier.api_calls < 0 {
                return Err(TierError::InvalidConfig(format!(
                    "tier {:?} has a negative api_calls allowance",
                    tier.tier_id
                )));
            }
        }

        if !seen.contains(file.default_tier.as_str()) {
            return Err(TierError::InvalidConfig(format!(
                "default tier {:?} is not defined",
                file.default_tier
            )));
        }

        Ok(Self {
            tiers: file.tiers,
            default_tier: file.default_tier,
        })
    }

    /// Load a tier file from disk.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tier file {}", path.display()))?;
        let registry = Self::from_toml_str(&content)
            .with_context(|| format!("failed to load tier file {}", path.display()))?;
        info!(path = %path.display(), tiers = registry.tiers.len(), "loaded subscription tiers");
        Ok(registry)
    }

    /// All plans in file order.
    pub fn list_plans(&self) -> &[SubscriptionTier] {
        &self.tiers
    }

    pub fn get(&self, tier_id: &str) -> Option<&SubscriptionTier> {
        self.tiers.iter().find(|t| t.tier_id == tier_id)
    }

    pub fn valid_ids(&self) -> Vec<String> {
        self.tiers.iter().map(|t| t.tier_id.clone()).collect()
    }

    /// The tier assigned to newly registered users.
    pub fn default_tier(&self) -> &SubscriptionTier {
        // from_toml_str guarantees the default exists.
        self.get(&self.default_tier).unwrap_or(&self.tiers[0])
    }

    /// Look up a tier, failing with the list of valid ids.
    pub fn require(&self, tier_id: &str) -> Result<&SubscriptionTier, TierError> {
        self.get(tier_id).ok_or_else(|| TierError::InvalidTier {
            tier: tier_id.to_string(),
            valid: self.valid_ids(),
        })
    }
}

impl Default for TierRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Tier changes
// ---------------------------------------------------------------------------

/// The user-row state produced by moving to a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAssignment {
    pub tier_id: String,
    pub monthly_api_limit: i32,
    pub api_limit_reset_at: DateTime<Utc>,
}

/// Compute the state a user moves to on a tier change at `now`.
///
/// Every change, including to the current tier, starts a fresh window with
/// the counter at zero.
pub fn apply_tier_change(
    registry: &TierRegistry,
    tier_id: &str,
    now: DateTime<Utc>,
) -> Result<TierAssignment, TierError> {
    let tier = registry.require(tier_id)?;
    Ok(TierAssignment {
        tier_id: tier.tier_id.clone(),
        monthly_api_limit: tier.api_calls,
        api_limit_reset_at: now + reset_period(),
    })
}

/// Move a user to `tier_id`. Unknown tiers leave the user untouched.
///
/// Used for both self-service changes and admin overrides.
pub async fn change_tier(
    pool: &PgPool,
    registry: &TierRegistry,
    user_id: Uuid,
    tier_id: &str,
) -> Result<User, TierError> {
    let assignment = apply_tier_change(registry, tier_id, Utc::now())?;

    let user = users::update_subscription(
        pool,
        user_id,
        &assignment.tier_id,
        assignment.monthly_api_limit,
        assignment.api_limit_reset_at,
    )
    .await?
    .ok_or(TierError::UserNotFound(user_id))?;

    info!(
        user_id = %user.id,
        tier = %user.subscription_tier,
        limit = user.monthly_api_limit,
        "subscription tier changed"
    );
    Ok(user)
}
