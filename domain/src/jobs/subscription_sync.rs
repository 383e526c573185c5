//! `subscription.sync`: reconciles a local subscription with the billing
//! provider's view of it.

use super::context::JobContext;
use super::{function_ids, unexpected_event};
use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::gateway::BillingSubscription;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::subscription_plan::SubscriptionPlan;
use entity::subscription_status::SubscriptionStatus;
use entity_api::subscription::{self, BillingState};
use events::{names, Event, Step, StepFunction, SubscriptionSyncPayload};
use log::*;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Output of the `fetch-subscription` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSubscription {
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

impl From<BillingSubscription> for RemoteSubscription {
    fn from(remote: BillingSubscription) -> Self {
        Self {
            status: remote.status,
            current_period_start: remote.current_period_start,
            current_period_end: remote.current_period_end,
        }
    }
}

/// Maps a billing provider status onto the local status set. Anything other
/// than active or cancelled (`past_due`, `unpaid`, `incomplete_expired`, ...)
/// counts as expired.
fn map_status(remote: &str) -> SubscriptionStatus {
    match remote {
        "active" => SubscriptionStatus::Active,
        "canceled" | "cancelled" => SubscriptionStatus::Cancelled,
        _ => SubscriptionStatus::Expired,
    }
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// The state to store. A subscription that is no longer active loses its paid
/// plan and is stored as expired.
fn billing_state(remote: &RemoteSubscription) -> BillingState {
    let (status, plan) = match map_status(&remote.status) {
        SubscriptionStatus::Active => (SubscriptionStatus::Active, None),
        SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => {
            (SubscriptionStatus::Expired, Some(SubscriptionPlan::Free))
        }
    };

    BillingState {
        status,
        plan,
        current_period_start: from_unix(remote.current_period_start).map(Into::into),
        current_period_end: from_unix(remote.current_period_end).map(Into::into),
    }
}

pub struct SubscriptionSynchronizer {
    ctx: Arc<JobContext>,
}

impl SubscriptionSynchronizer {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn sync(&self, payload: &SubscriptionSyncPayload, step: &Step) -> Result<Value, Error> {
        let ctx = self.ctx.as_ref();
        let db = ctx.db();
        let external_id = payload.subscription_id.as_str();

        let remote: RemoteSubscription = step
            .run("fetch-subscription", || async move {
                let remote = ctx
                    .external("fetch subscription", ctx.billing.get_subscription(external_id))
                    .await?;
                Ok::<_, Error>(RemoteSubscription::from(remote))
            })
            .await?;

        let state = billing_state(&remote);
        let (status, plan) = step
            .run("update-subscription", || async move {
                let txn = db.begin().await?;
                let updated = subscription::apply_billing_state(&txn, external_id, state).await?;
                txn.commit().await?;
                Ok::<_, Error>((updated.status, updated.plan))
            })
            .await?;

        info!(
            "Subscription {external_id} of user {} synced: billing status {} -> {status} / {plan:?}",
            payload.user_id, remote.status
        );

        Ok(json!({
            "subscriptionId": external_id,
            "status": status,
            "plan": plan,
        }))
    }
}

#[async_trait]
impl StepFunction for SubscriptionSynchronizer {
    fn id(&self) -> &'static str {
        function_ids::SUBSCRIPTION_SYNC
    }

    fn trigger(&self) -> &'static str {
        names::SUBSCRIPTION_SYNC
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::SubscriptionSync(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        self.sync(payload, step).await.map_err(|err| {
            error!(
                "Failed to sync subscription {} of user {}: {err}",
                payload.subscription_id, payload.user_id
            );
            if err.error_kind
                == DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
            {
                err.non_retryable()
            } else {
                err.into_function_error()
            }
        })
    }
}
