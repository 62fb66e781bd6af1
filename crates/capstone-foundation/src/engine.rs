//! Policy engine facade
//!
//! Bundles the validator, gate, limiter, code issuer and backup validator
//! behind one handle built from a [`PolicyConfig`] and a store. Entry
//! points run validate, then gate, then act, and stop at the first failure.

use crate::access::AccessGate;
use crate::backup::{BackupPackage, BackupValidator};
use crate::codes::CodeIssuer;
use crate::config::PolicyConfig;
use crate::validation::{InputValidator, RateLimiter, validate_adviser_code};
use capstone_kernel::id::{Groups, Users};
use capstone_kernel::{
    AdviserRecord, Group, Id, PolicyError, PolicyResult, PortalStore, Role, StoreError,
    ValidationError, live,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PolicyEngine {
    config: PolicyConfig,
    store: Arc<dyn PortalStore>,
    validator: InputValidator,
    limiter: RateLimiter,
    gate: AccessGate,
    issuer: CodeIssuer,
    backups: BackupValidator,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig, store: Arc<dyn PortalStore>) -> Self {
        Self {
            validator: InputValidator::new(config.limits),
            limiter: RateLimiter::new(),
            gate: AccessGate::new(store.clone()),
            issuer: CodeIssuer::with_max_attempts(store.clone(), config.codes.max_attempts),
            backups: BackupValidator::new(),
            config,
            store,
        }
    }

    /// Engine with the built-in defaults.
    pub fn with_store(store: Arc<dyn PortalStore>) -> Self {
        Self::new(PolicyConfig::default(), store)
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn issuer(&self) -> &CodeIssuer {
        &self.issuer
    }

    /// Count one call to `operation` by `actor_id` under its configured rule.
    ///
    /// Operations without a configured rule are not limited.
    pub async fn limit(&self, operation: &str, actor_id: &Id<Users>) -> PolicyResult<()> {
        match self.config.rate_limit(operation) {
            Some(rule) => self.limiter.enforce(operation, actor_id.as_str(), rule).await,
            None => {
                debug!(operation, "no rate limit configured");
                Ok(())
            }
        }
    }

    pub async fn issue_adviser_code(&self) -> PolicyResult<String> {
        self.issuer.issue_unique_code().await
    }

    /// Give an adviser account its linking code. Instructors only.
    pub async fn create_adviser(
        &self,
        instructor_id: &Id<Users>,
        adviser_id: &Id<Users>,
    ) -> PolicyResult<AdviserRecord> {
        self.gate.require_instructor(instructor_id).await?;

        let target = self.gate.resolve_actor(adviser_id).await?;
        if target.role != Role::Adviser {
            return Err(ValidationError::new(
                "adviser_id",
                format!("account has role {}", target.role),
                "NOT_AN_ADVISER",
            )
            .into());
        }
        if live(self.store.get_adviser_by_user(adviser_id).await?).is_some() {
            return Err(ValidationError::new(
                "adviser_id",
                "adviser already has a linking code",
                "ADVISER_EXISTS",
            )
            .into());
        }

        let code = self.issuer.issue_unique_code().await?;
        let record = AdviserRecord::new(adviser_id.clone(), code);
        self.store
            .insert_adviser(record.clone())
            .await
            .inspect_err(|e| {
                if matches!(e, StoreError::Constraint(_)) {
                    warn!(adviser_id = %adviser_id, "adviser code taken between check and insert");
                }
            })?;

        info!(
            instructor_id = %instructor_id,
            adviser_id = %adviser_id,
            "adviser record created"
        );
        Ok(record)
    }

    /// Let a group's project manager claim an adviser by linking code.
    ///
    /// The group is read again right before the write, so a claim that
    /// landed while the code was being resolved is not overwritten. The
    /// store has no compare-and-swap, so two claims racing on that final
    /// read can still both write; the last one wins.
    pub async fn claim_adviser(
        &self,
        actor_id: &Id<Users>,
        group_id: &Id<Groups>,
        code: &Value,
    ) -> PolicyResult<Group> {
        let code = validate_adviser_code(code)?;
        self.gate.require_project_manager(actor_id, group_id).await?;

        let adviser = live(self.store.find_adviser_by_code(&code).await?)
            .ok_or_else(|| PolicyError::not_found("adviser", code.as_str()))?;
        self.gate
            .require_any_role(&adviser.adviser_id, &[Role::Adviser])
            .await?;

        let mut group = live(self.store.get_group(group_id).await?)
            .ok_or_else(|| PolicyError::not_found("group", group_id.as_str()))?;
        match &group.adviser_id {
            Some(current) if current == &adviser.adviser_id => return Ok(group),
            Some(_) => {
                return Err(PolicyError::Forbidden {
                    reason: format!("group {group_id} already has an adviser"),
                });
            }
            None => {}
        }

        group.adviser_id = Some(adviser.adviser_id.clone());
        self.store.insert_group(group.clone()).await?;

        info!(
            group_id = %group_id,
            adviser_id = %adviser.adviser_id,
            "group claimed adviser"
        );
        Ok(group)
    }

    /// Pre-flight check for a restore; nothing is written.
    pub fn validate_restore(&self, payload: &Value) -> PolicyResult<BackupPackage> {
        self.backups.validate(payload)
    }
}
