//! Allocation status changes, from an operator or the expiry job.

use rcalloc_core::allocation::{plan_allocation_status_change, AllocationDates, AllocationStatus};
use rcalloc_core::audit::{entity_types, status_change_reason};
use rcalloc_core::cluster_access::unknown_status_message;
use rcalloc_core::config::WorkflowConfig;
use rcalloc_core::error::CoreError;
use rcalloc_core::policy::Actor;
use rcalloc_core::types::{Date, DbId};
use rcalloc_core::validation::ValidationErrors;
use rcalloc_db::models::allocation::Allocation;
use rcalloc_db::repositories::history_repo::HistoryContext;
use rcalloc_db::repositories::{AllocationRepo, HistoryRepo, ProjectRepo};
use rcalloc_db::DbPool;
use rcalloc_events::templates::ids;
use rcalloc_events::{EmailMessage, Mailer};
use serde_json::json;
use sqlx::PgConnection;

use super::{compose, dangling, send_safely};
use crate::error::AppResult;

/// Parse a requested allocation status name.
pub fn parse_status(name: &str) -> Result<AllocationStatus, ValidationErrors> {
    let name = name.trim();
    AllocationStatus::from_name(name).ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.push_invalid(Some("status"), unknown_status_message(name));
        errors
    })
}

/// Applies allocation status changes.
pub struct AllocationStatusRunner<'a> {
    pool: &'a DbPool,
    mailer: &'a dyn Mailer,
    config: &'a WorkflowConfig,
}

impl<'a> AllocationStatusRunner<'a> {
    pub fn new(pool: &'a DbPool, mailer: &'a dyn Mailer, config: &'a WorkflowConfig) -> Self {
        Self {
            pool,
            mailer,
            config,
        }
    }

    /// Move allocation `allocation_id` to `target`.
    ///
    /// `actor` is `None` for scheduled jobs. Expiring an allocation notifies
    /// the project's subscribed members after commit.
    pub async fn change_status(
        &self,
        actor: Option<&Actor>,
        allocation_id: DbId,
        target: AllocationStatus,
        today: Date,
    ) -> AppResult<Allocation> {
        let mut tx = self.pool.begin().await?;

        let allocation = AllocationRepo::find_for_update(&mut *tx, allocation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Allocation",
                id: allocation_id,
            })?;
        let current = AllocationStatus::from_name(&allocation.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "allocation {} has unknown status {:?}",
                allocation.id, allocation.status
            ))
        })?;

        plan_allocation_status_change(
            current,
            target,
            AllocationDates {
                start_date: allocation.start_date,
                end_date: allocation.end_date,
            },
            today,
        )?;

        let updated = AllocationRepo::update_status(&mut *tx, allocation_id, target.as_str()).await?;
        let reason = status_change_reason(current.as_str(), target.as_str());
        HistoryRepo::record(
            &mut tx,
            entity_types::ALLOCATION,
            updated.id,
            &updated,
            HistoryContext {
                user_id: actor.map(|a| a.user_id),
                reason: Some(&reason),
            },
        )
        .await?;

        let email = if target == AllocationStatus::Expired {
            self.expiry_message(&mut tx, &updated).await?
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            allocation_id,
            from = %current,
            to = %target,
            user_id = ?actor.map(|a| a.user_id),
            "Allocation status changed"
        );

        if let Some(message) = email {
            send_safely(self.mailer, &message).await;
        }

        Ok(updated)
    }

    async fn expiry_message(
        &self,
        conn: &mut PgConnection,
        allocation: &Allocation,
    ) -> AppResult<Option<EmailMessage>> {
        let project = ProjectRepo::find_by_id(&mut *conn, allocation.project_id)
            .await?
            .ok_or_else(|| dangling("Project", allocation.project_id))?;
        let resources = AllocationRepo::resource_names(&mut *conn, allocation.id).await?;
        let recipients = ProjectRepo::notification_emails(&mut *conn, project.id).await?;

        Ok(compose(
            self.config,
            "Allocation Expired",
            ids::ALLOCATION_EXPIRED,
            json!({
                "project_name": project.name,
                "allocation_id": allocation.id,
                "resources": resources.join(", "),
                "end_date": allocation.end_date.map(|d| d.to_string()),
                "center_help_email": self.config.center_help_email,
                "signature": self.config.email_signature,
            }),
            recipients,
            Vec::new(),
        ))
    }
}
