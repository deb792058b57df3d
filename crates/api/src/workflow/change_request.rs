//! Allocation change requests: creation by project managers, review by
//! superusers.
//!
//! Approval applies the requested end-date extension and attribute values
//! to the allocation in the same transaction that marks the request
//! Approved.

use rcalloc_core::allocation::{
    extend_end_date, validate_change_request, AllocationStatus, ChangeRequestStatus,
    ChangeTarget, ProposedAttributeChange,
};
use rcalloc_core::audit::{entity_types, status_change_reason};
use rcalloc_core::config::WorkflowConfig;
use rcalloc_core::error::CoreError;
use rcalloc_core::policy::{authorize, Action, Actor, Resource};
use rcalloc_core::types::DbId;
use rcalloc_core::validation::ValidationErrors;
use rcalloc_db::models::allocation::Allocation;
use rcalloc_db::models::change_request::{
    ChangeRequest, ChangeRequestDetail, CreateChangeRequest, ReviewChangeRequest,
};
use rcalloc_db::repositories::history_repo::HistoryContext;
use rcalloc_db::repositories::{AllocationRepo, ChangeRequestRepo, HistoryRepo, ProjectRepo};
use rcalloc_db::DbPool;
use rcalloc_events::templates::ids;
use rcalloc_events::Mailer;
use serde_json::json;
use sqlx::PgConnection;
use validator::Validate;

use super::{compose, dangling, send_safely};
use crate::error::AppResult;

/// Creates and reviews allocation change requests.
pub struct ChangeRequestRunner<'a> {
    pool: &'a DbPool,
    mailer: &'a dyn Mailer,
    config: &'a WorkflowConfig,
}

impl<'a> ChangeRequestRunner<'a> {
    pub fn new(pool: &'a DbPool, mailer: &'a dyn Mailer, config: &'a WorkflowConfig) -> Self {
        Self {
            pool,
            mailer,
            config,
        }
    }

    /// Open a pending change request against an allocation.
    ///
    /// Only superusers and the project's PIs and managers may request
    /// changes. All input and allocation-state problems are reported
    /// together.
    pub async fn create(
        &self,
        actor: &Actor,
        allocation_id: DbId,
        input: &CreateChangeRequest,
    ) -> AppResult<ChangeRequestDetail> {
        let mut errors = match input.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => ValidationErrors::from_field_errors(&e),
        };

        let mut tx = self.pool.begin().await?;

        let allocation = AllocationRepo::find_for_update(&mut *tx, allocation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Allocation",
                id: allocation_id,
            })?;
        let managers = ProjectRepo::manager_ids(&mut *tx, allocation.project_id).await?;
        authorize(
            actor,
            Action::Request,
            &Resource::Allocation {
                project_managers: &managers,
            },
        )?;

        let status = AllocationStatus::from_name(&allocation.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "allocation {} has unknown status {:?}",
                allocation.id, allocation.status
            ))
        })?;
        let has_pending_request = ChangeRequestRepo::has_pending(&mut *tx, allocation_id).await?;

        let mut resolved: Vec<(String, &str)> = Vec::with_capacity(input.attribute_changes.len());
        for item in &input.attribute_changes {
            match AllocationRepo::find_attribute_by_id(&mut *tx, item.allocation_attribute_id)
                .await?
            {
                Some(attr) if attr.allocation_id == allocation_id => {
                    resolved.push((attr.name, item.new_value.as_str()));
                }
                _ => errors.push_invalid(
                    Some("attribute_changes"),
                    format!(
                        "Allocation attribute {} does not belong to allocation {allocation_id}.",
                        item.allocation_attribute_id
                    ),
                ),
            }
        }
        let proposed: Vec<ProposedAttributeChange<'_>> = resolved
            .iter()
            .map(|(name, value)| ProposedAttributeChange {
                attribute_name: name,
                new_value: value,
            })
            .collect();

        let target = ChangeTarget {
            status,
            is_changeable: allocation.is_changeable,
            is_locked: allocation.is_locked,
            has_pending_request,
        };
        if let Err(e) = validate_change_request(
            target,
            input.end_date_extension,
            &proposed,
            &self.config.allowed_extension_days,
        ) {
            errors.extend(e);
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let request = ChangeRequestRepo::create(&mut tx, allocation_id, actor.user_id, input).await?;
        HistoryRepo::record(
            &mut tx,
            entity_types::CHANGE_REQUEST,
            request.id,
            &request,
            HistoryContext {
                user_id: Some(actor.user_id),
                reason: None,
            },
        )
        .await?;
        let attribute_changes = ChangeRequestRepo::list_items(&mut *tx, request.id).await?;

        tx.commit().await?;

        tracing::info!(
            change_request_id = request.id,
            allocation_id,
            user_id = actor.user_id,
            end_date_extension = ?request.end_date_extension,
            attribute_changes = attribute_changes.len(),
            "Allocation change request created"
        );

        Ok(ChangeRequestDetail {
            change_request: request,
            attribute_changes,
        })
    }

    /// Approve a pending request and apply its changes to the allocation.
    pub async fn approve(
        &self,
        actor: &Actor,
        change_request_id: DbId,
        review: &ReviewChangeRequest,
    ) -> AppResult<ChangeRequestDetail> {
        let mut tx = self.pool.begin().await?;
        let (request, from) =
            lock_for_review(&mut tx, change_request_id, ChangeRequestStatus::Approved).await?;
        let allocation = AllocationRepo::find_for_update(&mut *tx, request.allocation_id)
            .await?
            .ok_or_else(|| dangling("Allocation", request.allocation_id))?;
        let ctx = HistoryContext {
            user_id: Some(actor.user_id),
            reason: None,
        };

        let mut end_date = allocation.end_date;
        if let Some(days) = request.end_date_extension {
            let extended = AllocationRepo::set_end_date(
                &mut *tx,
                allocation.id,
                extend_end_date(allocation.end_date, days),
            )
            .await?;
            let reason = format!(
                "End date extended by {days} days by change request {}.",
                request.id
            );
            HistoryRepo::record(
                &mut tx,
                entity_types::ALLOCATION,
                extended.id,
                &extended,
                HistoryContext {
                    reason: Some(&reason),
                    ..ctx
                },
            )
            .await?;
            end_date = extended.end_date;
        }

        let items = ChangeRequestRepo::list_items(&mut *tx, request.id).await?;
        let attr_reason = format!("Changed by change request {}.", request.id);
        for item in &items {
            let attr =
                AllocationRepo::set_attribute_value(&mut *tx, item.allocation_attribute_id, &item.new_value)
                    .await?;
            HistoryRepo::record(
                &mut tx,
                entity_types::ALLOCATION_ATTRIBUTE,
                attr.id,
                &attr,
                HistoryContext {
                    reason: Some(&attr_reason),
                    ..ctx
                },
            )
            .await?;
        }

        let approved = record_review(
            &mut tx,
            actor,
            &request,
            from,
            ChangeRequestStatus::Approved,
            review.notes.as_deref(),
        )
        .await?;

        let changes: Vec<_> = items
            .iter()
            .map(|i| json!({"attribute_name": i.attribute_name, "new_value": i.new_value}))
            .collect();
        let email = self
            .review_message(
                &mut tx,
                &allocation,
                "Allocation Change Request Approved",
                ids::ALLOCATION_CHANGE_APPROVED,
                json!({
                    "allocation_id": allocation.id,
                    "end_date": end_date.map(|d| d.to_string()),
                    "attribute_changes": changes,
                    "notes": approved.notes,
                    "signature": self.config.email_signature,
                }),
            )
            .await?;

        let attribute_changes = ChangeRequestRepo::list_items(&mut *tx, approved.id).await?;
        tx.commit().await?;

        tracing::info!(
            change_request_id = approved.id,
            allocation_id = allocation.id,
            user_id = actor.user_id,
            "Allocation change request approved"
        );
        if let Some(message) = email {
            send_safely(self.mailer, &message).await;
        }

        Ok(ChangeRequestDetail {
            change_request: approved,
            attribute_changes,
        })
    }

    /// Deny a pending request. The allocation is left untouched.
    pub async fn deny(
        &self,
        actor: &Actor,
        change_request_id: DbId,
        review: &ReviewChangeRequest,
    ) -> AppResult<ChangeRequestDetail> {
        let mut tx = self.pool.begin().await?;
        let (request, from) =
            lock_for_review(&mut tx, change_request_id, ChangeRequestStatus::Denied).await?;
        let allocation = AllocationRepo::find_by_id(&mut *tx, request.allocation_id)
            .await?
            .ok_or_else(|| dangling("Allocation", request.allocation_id))?;

        let denied = record_review(
            &mut tx,
            actor,
            &request,
            from,
            ChangeRequestStatus::Denied,
            review.notes.as_deref(),
        )
        .await?;

        let email = self
            .review_message(
                &mut tx,
                &allocation,
                "Allocation Change Request Denied",
                ids::ALLOCATION_CHANGE_DENIED,
                json!({
                    "allocation_id": allocation.id,
                    "notes": denied.notes,
                    "center_help_email": self.config.center_help_email,
                    "signature": self.config.email_signature,
                }),
            )
            .await?;

        let attribute_changes = ChangeRequestRepo::list_items(&mut *tx, denied.id).await?;
        tx.commit().await?;

        tracing::info!(
            change_request_id = denied.id,
            allocation_id = allocation.id,
            user_id = actor.user_id,
            "Allocation change request denied"
        );
        if let Some(message) = email {
            send_safely(self.mailer, &message).await;
        }

        Ok(ChangeRequestDetail {
            change_request: denied,
            attribute_changes,
        })
    }

    /// Address a review outcome to the project's subscribed members.
    async fn review_message(
        &self,
        conn: &mut PgConnection,
        allocation: &Allocation,
        subject: &str,
        template: &str,
        mut context: serde_json::Value,
    ) -> AppResult<Option<rcalloc_events::EmailMessage>> {
        let project = ProjectRepo::find_by_id(&mut *conn, allocation.project_id)
            .await?
            .ok_or_else(|| dangling("Project", allocation.project_id))?;
        let recipients = ProjectRepo::notification_emails(&mut *conn, project.id).await?;
        context["project_name"] = json!(project.name);
        Ok(compose(self.config, subject, template, context, recipients, Vec::new()))
    }
}

/// Lock a change request and check that it may move to `target`.
async fn lock_for_review(
    conn: &mut PgConnection,
    id: DbId,
    target: ChangeRequestStatus,
) -> AppResult<(ChangeRequest, ChangeRequestStatus)> {
    let request = ChangeRequestRepo::find_for_update(&mut *conn, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ChangeRequest",
            id,
        })?;
    let from = ChangeRequestStatus::from_name(&request.status).ok_or_else(|| {
        CoreError::Internal(format!(
            "change request {} has unknown status {:?}",
            request.id, request.status
        ))
    })?;
    if !from.can_transition_to(target) {
        let mut errors = ValidationErrors::new();
        errors.push_invalid(
            Some("status"),
            format!("Cannot change status from {from} to {target}."),
        );
        return Err(errors.into());
    }
    Ok((request, from))
}

/// Store the review outcome and its history record.
async fn record_review(
    conn: &mut PgConnection,
    actor: &Actor,
    request: &ChangeRequest,
    from: ChangeRequestStatus,
    to: ChangeRequestStatus,
    notes: Option<&str>,
) -> AppResult<ChangeRequest> {
    let updated = ChangeRequestRepo::set_status(&mut *conn, request.id, to.as_str(), notes).await?;
    let reason = status_change_reason(from.as_str(), to.as_str());
    HistoryRepo::record(
        &mut *conn,
        entity_types::CHANGE_REQUEST,
        updated.id,
        &updated,
        HistoryContext {
            user_id: Some(actor.user_id),
            reason: Some(&reason),
        },
    )
    .await?;
    Ok(updated)
}
