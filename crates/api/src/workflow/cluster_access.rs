//! Cluster access request transitions.
//!
//! [`ClusterAccessRunner::apply`] is the only code path that changes a
//! request's status. Completing a request activates the user's cluster
//! account: it records the username and cluster uid on the user, marks
//! the allocation user's "Cluster Account Status" attribute Active, and
//! copies service units for the primary compute resource.

use chrono::Utc;
use rcalloc_core::allocation::{
    AllocationUserStatus, CLUSTER_ACCOUNT_STATUS_ATTRIBUTE, SERVICE_UNITS_ATTRIBUTE,
};
use rcalloc_core::audit::{entity_types, status_change_reason};
use rcalloc_core::cluster_access::{
    cluster_uid_taken_message, is_valid_cluster_uid, is_valid_username, plan_transition,
    username_taken_message, ClusterAccessPatch, ClusterAccessStatus, CompletionFields,
    CurrentRequest, Transition,
};
use rcalloc_core::config::WorkflowConfig;
use rcalloc_core::error::CoreError;
use rcalloc_core::policy::Actor;
use rcalloc_core::types::{DbId, Timestamp};
use rcalloc_core::validation::ValidationErrors;
use rcalloc_db::models::allocation::AllocationUser;
use rcalloc_db::models::cluster_access_request::ClusterAccessRequest;
use rcalloc_db::models::project::Project;
use rcalloc_db::models::user::User;
use rcalloc_db::repositories::cluster_access_request_repo::ClusterAccessUpdate;
use rcalloc_db::repositories::history_repo::HistoryContext;
use rcalloc_db::repositories::{
    AllocationRepo, AllocationUserRepo, ClusterAccessRequestRepo, HistoryRepo, ProjectRepo,
    UserProfileRepo, UserRepo,
};
use rcalloc_db::DbPool;
use rcalloc_events::templates::ids;
use rcalloc_events::{EmailMessage, Mailer};
use serde_json::json;
use sqlx::PgConnection;

use super::{compose, dangling, send_safely};
use crate::error::AppResult;

/// Attribute value written when access is granted or refused.
const ACCOUNT_ACTIVE: &str = "Active";
const ACCOUNT_DENIED: &str = "Denied";

/// Result of [`ClusterAccessRunner::apply`].
#[derive(Debug)]
pub struct ClusterAccessOutcome {
    /// The request as stored after the transition.
    pub request: ClusterAccessRequest,
    /// False when the patch matched the stored state and nothing was written.
    pub changed: bool,
    /// `Some(delivered)` when a notification was handed to the mailer.
    pub email_sent: Option<bool>,
}

/// What a committed transition still has to do.
struct Applied {
    request: ClusterAccessRequest,
    log_lines: Vec<String>,
    email: Option<EmailMessage>,
}

/// The people and project a request belongs to.
struct Parties {
    allocation_user: AllocationUser,
    user: User,
    project: Project,
    cc: Vec<String>,
}

/// Service units copied onto an allocation user, and the ledger row for it.
struct ServiceUnitsCopied {
    value: String,
    transaction_id: DbId,
}

/// Applies status patches to cluster access requests.
pub struct ClusterAccessRunner<'a> {
    pool: &'a DbPool,
    mailer: &'a dyn Mailer,
    config: &'a WorkflowConfig,
}

impl<'a> ClusterAccessRunner<'a> {
    pub fn new(pool: &'a DbPool, mailer: &'a dyn Mailer, config: &'a WorkflowConfig) -> Self {
        Self {
            pool,
            mailer,
            config,
        }
    }

    /// Validate `patch` against request `request_id` and apply it.
    ///
    /// Every validation and uniqueness problem is reported at once as
    /// `CoreError::Rejected`; nothing is written in that case. An identical
    /// resubmission is accepted without writing anything.
    pub async fn apply(
        &self,
        actor: &Actor,
        request_id: DbId,
        patch: &ClusterAccessPatch,
    ) -> AppResult<ClusterAccessOutcome> {
        let mut tx = self.pool.begin().await?;

        let request = ClusterAccessRequestRepo::find_for_update(&mut *tx, request_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ClusterAccessRequest",
                id: request_id,
            })?;
        let current_status = ClusterAccessStatus::from_name(&request.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "cluster access request {} has unknown status {:?}",
                request.id, request.status
            ))
        })?;
        let allocation_user =
            AllocationUserRepo::find_by_id(&mut *tx, request.allocation_user_id)
                .await?
                .ok_or_else(|| dangling("AllocationUser", request.allocation_user_id))?;

        let current = CurrentRequest {
            status: current_status,
            completion_time: request.completion_time,
            username: request.username.as_deref(),
            cluster_uid: request.cluster_uid.as_deref(),
        };
        let (transition, mut errors) = match plan_transition(current, patch) {
            Ok(t) => (Some(t), ValidationErrors::new()),
            Err(e) => (None, e),
        };

        let completing = match &transition {
            Some(t) => matches!(t, Transition::Complete(_)),
            None => requested_status(patch) == Some(ClusterAccessStatus::Active),
        };
        if completing {
            let conflicts =
                check_ownership(&mut tx, patch, allocation_user.user_id).await?;
            errors.extend(conflicts);
        }

        let transition = match transition {
            Some(t) if errors.is_empty() => t,
            _ => {
                tracing::info!(
                    request_id,
                    messages = errors.len(),
                    "Cluster access request update rejected"
                );
                return Err(errors.into());
            }
        };

        let applied = match transition {
            Transition::NoOp => {
                tx.commit().await?;
                tracing::debug!(request_id, "Cluster access request unchanged");
                return Ok(ClusterAccessOutcome {
                    request,
                    changed: false,
                    email_sent: None,
                });
            }
            Transition::Move(status) => {
                let updated = write_request(
                    &mut tx,
                    actor,
                    &request,
                    ClusterAccessUpdate {
                        status: status.as_str(),
                        completion_time: None,
                        username: None,
                        cluster_uid: None,
                    },
                )
                .await?;
                let line = format!(
                    "Cluster access request {} moved from {} to {}.",
                    updated.id, request.status, updated.status
                );
                Applied {
                    request: updated,
                    log_lines: vec![line],
                    email: None,
                }
            }
            Transition::Complete(fields) => {
                let parties = load_parties(&mut tx, allocation_user).await?;
                self.complete(&mut tx, actor, &request, parties, fields).await?
            }
            Transition::Deny(completion_time) => {
                let parties = load_parties(&mut tx, allocation_user).await?;
                self.deny(&mut tx, actor, &request, parties, completion_time)
                    .await?
            }
        };

        tx.commit().await?;

        for line in &applied.log_lines {
            tracing::info!(request_id, user_id = actor.user_id, "{line}");
        }

        let email_sent = match &applied.email {
            Some(message) => Some(send_safely(self.mailer, message).await),
            None => None,
        };

        Ok(ClusterAccessOutcome {
            request: applied.request,
            changed: true,
            email_sent,
        })
    }

    async fn complete(
        &self,
        conn: &mut PgConnection,
        actor: &Actor,
        request: &ClusterAccessRequest,
        parties: Parties,
        fields: CompletionFields,
    ) -> AppResult<Applied> {
        let ctx = HistoryContext {
            user_id: Some(actor.user_id),
            reason: None,
        };
        let Parties {
            allocation_user,
            user,
            project,
            cc,
        } = parties;

        let updated = write_request(
            &mut *conn,
            actor,
            request,
            ClusterAccessUpdate {
                status: ClusterAccessStatus::Active.as_str(),
                completion_time: Some(fields.completion_time),
                username: Some(&fields.username),
                cluster_uid: Some(&fields.cluster_uid),
            },
        )
        .await?;

        let account = AllocationUserRepo::upsert_attribute(
            &mut *conn,
            allocation_user.id,
            CLUSTER_ACCOUNT_STATUS_ATTRIBUTE,
            ACCOUNT_ACTIVE,
        )
        .await?;
        HistoryRepo::record(
            &mut *conn,
            entity_types::ALLOCATION_USER_ATTRIBUTE,
            account.id,
            &account,
            ctx,
        )
        .await?;

        if user.username != fields.username {
            let renamed = UserRepo::set_username(&mut *conn, user.id, &fields.username)
                .await?
                .ok_or_else(|| dangling("User", user.id))?;
            HistoryRepo::record(&mut *conn, entity_types::USER, renamed.id, &renamed, ctx)
                .await?;
        }

        let profile = UserProfileRepo::set_cluster_uid(&mut *conn, user.id, &fields.cluster_uid)
            .await?
            .ok_or_else(|| dangling("UserProfile for user", user.id))?;
        HistoryRepo::record(
            &mut *conn,
            entity_types::USER_PROFILE,
            profile.id,
            &profile,
            ctx,
        )
        .await?;

        let mut log_lines = vec![
            format!(
                "Successfully completed cluster access request {} from User {} under Project {} \
                 and Allocation {}. Cluster access for {} has been ACTIVATED.",
                updated.id, user.email, project.name, allocation_user.allocation_id, fields.username
            ),
            format!(
                "Activated Cluster Account Status AllocationUserAttribute {}.",
                account.id
            ),
            format!("Set username for user {}.", user.id),
            format!("Set cluster uid for user {}.", user.id),
        ];

        if allocation_user.status != AllocationUserStatus::Active.as_str() {
            let activated = AllocationUserRepo::update_status(
                &mut *conn,
                allocation_user.id,
                AllocationUserStatus::Active.as_str(),
            )
            .await?;
            let reason = status_change_reason(&allocation_user.status, &activated.status);
            HistoryRepo::record(
                &mut *conn,
                entity_types::ALLOCATION_USER,
                activated.id,
                &activated,
                HistoryContext {
                    reason: Some(&reason),
                    ..ctx
                },
            )
            .await?;
            log_lines.push(format!("Activated AllocationUser {}.", activated.id));
        }

        if let Some(units) = self
            .copy_service_units(&mut *conn, &allocation_user, project.id, ctx)
            .await?
        {
            log_lines.push(format!(
                "Set Service Units for AllocationUser {} to {}. Created ProjectUserTransaction \
                 {} to record the change.",
                allocation_user.id, units.value, units.transaction_id
            ));
        }

        let email = compose(
            self.config,
            "Cluster Access Activated",
            ids::CLUSTER_ACCESS_ACTIVATED,
            json!({
                "user_first_name": user.first_name,
                "user_last_name": user.last_name,
                "username": fields.username,
                "program_name_short": self.config.program_name_short,
                "project_name": project.name,
                "center_user_guide": self.config.center_user_guide,
                "center_login_guide": self.config.center_login_guide,
                "center_help_email": self.config.center_help_email,
                "signature": self.config.email_signature,
            }),
            vec![user.email.clone()],
            cc,
        );

        Ok(Applied {
            request: updated,
            log_lines,
            email,
        })
    }

    async fn deny(
        &self,
        conn: &mut PgConnection,
        actor: &Actor,
        request: &ClusterAccessRequest,
        parties: Parties,
        completion_time: Option<Timestamp>,
    ) -> AppResult<Applied> {
        let Parties {
            allocation_user,
            user,
            project,
            cc,
        } = parties;

        let updated = write_request(
            &mut *conn,
            actor,
            request,
            ClusterAccessUpdate {
                status: ClusterAccessStatus::Denied.as_str(),
                completion_time: Some(completion_time.unwrap_or_else(Utc::now)),
                username: None,
                cluster_uid: None,
            },
        )
        .await?;

        let account = AllocationUserRepo::upsert_attribute(
            &mut *conn,
            allocation_user.id,
            CLUSTER_ACCOUNT_STATUS_ATTRIBUTE,
            ACCOUNT_DENIED,
        )
        .await?;
        HistoryRepo::record(
            &mut *conn,
            entity_types::ALLOCATION_USER_ATTRIBUTE,
            account.id,
            &account,
            HistoryContext {
                user_id: Some(actor.user_id),
                reason: None,
            },
        )
        .await?;

        let log_lines = vec![format!(
            "Successfully DENIED cluster access request {} from User {} under Project {} \
             and Allocation {}.",
            updated.id, user.email, project.name, allocation_user.allocation_id
        )];

        let email = compose(
            self.config,
            "Cluster Access Denied",
            ids::CLUSTER_ACCESS_DENIED,
            json!({
                "user_first_name": user.first_name,
                "user_last_name": user.last_name,
                "center_name": self.config.center_name,
                "project_name": project.name,
                "allocation_id": allocation_user.allocation_id,
                "center_help_email": self.config.center_help_email,
                "signature": self.config.email_signature,
            }),
            vec![user.email.clone()],
            cc,
        );

        Ok(Applied {
            request: updated,
            log_lines,
            email,
        })
    }

    /// Copy the allocation's service units onto the allocation user when the
    /// allocation covers the primary compute resource, and record the grant
    /// in the member's transaction ledger.
    async fn copy_service_units(
        &self,
        conn: &mut PgConnection,
        allocation_user: &AllocationUser,
        project_id: DbId,
        ctx: HistoryContext<'_>,
    ) -> AppResult<Option<ServiceUnitsCopied>> {
        let Some(primary) = self.config.primary_compute_resource.as_deref() else {
            return Ok(None);
        };
        let resources =
            AllocationRepo::resource_names(&mut *conn, allocation_user.allocation_id).await?;
        if !resources.iter().any(|r| r == primary) {
            return Ok(None);
        }
        let Some(units) = AllocationRepo::find_attribute(
            &mut *conn,
            allocation_user.allocation_id,
            SERVICE_UNITS_ATTRIBUTE,
        )
        .await?
        else {
            tracing::warn!(
                allocation_id = allocation_user.allocation_id,
                "Allocation on the primary compute resource has no Service Units attribute"
            );
            return Ok(None);
        };

        let copied = AllocationUserRepo::upsert_attribute(
            &mut *conn,
            allocation_user.id,
            SERVICE_UNITS_ATTRIBUTE,
            &units.value,
        )
        .await?;
        HistoryRepo::record(
            &mut *conn,
            entity_types::ALLOCATION_USER_ATTRIBUTE,
            copied.id,
            &copied,
            ctx,
        )
        .await?;

        let member = ProjectRepo::find_member(&mut *conn, project_id, allocation_user.user_id)
            .await?
            .ok_or_else(|| dangling("ProjectUser for user", allocation_user.user_id))?;
        let transaction =
            ProjectRepo::record_transaction(&mut *conn, member.id, &copied.value).await?;

        Ok(Some(ServiceUnitsCopied {
            value: copied.value,
            transaction_id: transaction.id,
        }))
    }
}

/// The status a patch names, if it names a known one.
fn requested_status(patch: &ClusterAccessPatch) -> Option<ClusterAccessStatus> {
    patch
        .status
        .as_deref()
        .map(str::trim)
        .and_then(ClusterAccessStatus::from_name)
}

/// Report well-formed usernames and cluster uids held by another user.
async fn check_ownership(
    conn: &mut PgConnection,
    patch: &ClusterAccessPatch,
    user_id: DbId,
) -> AppResult<ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let username = patch.username.as_deref().map(str::trim);
    if let Some(username) = username.filter(|u| is_valid_username(u)) {
        if UserRepo::username_taken_by_other(&mut *conn, username, user_id).await? {
            errors.push_conflict(username_taken_message(username));
        }
    }

    let cluster_uid = patch.cluster_uid.as_deref().map(str::trim);
    if let Some(cluster_uid) = cluster_uid.filter(|c| is_valid_cluster_uid(c)) {
        if UserProfileRepo::cluster_uid_taken_by_other(&mut *conn, cluster_uid, user_id).await? {
            errors.push_conflict(cluster_uid_taken_message(cluster_uid));
        }
    }

    Ok(errors)
}

/// Update the request row and record its status change.
async fn write_request(
    conn: &mut PgConnection,
    actor: &Actor,
    request: &ClusterAccessRequest,
    update: ClusterAccessUpdate<'_>,
) -> AppResult<ClusterAccessRequest> {
    let updated = ClusterAccessRequestRepo::apply_update(&mut *conn, request.id, &update).await?;
    let reason = status_change_reason(&request.status, &updated.status);
    HistoryRepo::record(
        &mut *conn,
        entity_types::CLUSTER_ACCESS_REQUEST,
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

/// Load the user, project and notification list for a request.
async fn load_parties(
    conn: &mut PgConnection,
    allocation_user: AllocationUser,
) -> AppResult<Parties> {
    let user = UserRepo::find_by_id(&mut *conn, allocation_user.user_id)
        .await?
        .ok_or_else(|| dangling("User", allocation_user.user_id))?;
    let allocation = AllocationRepo::find_by_id(&mut *conn, allocation_user.allocation_id)
        .await?
        .ok_or_else(|| dangling("Allocation", allocation_user.allocation_id))?;
    let project = ProjectRepo::find_by_id(&mut *conn, allocation.project_id)
        .await?
        .ok_or_else(|| dangling("Project", allocation.project_id))?;
    let cc = ProjectRepo::notification_emails(&mut *conn, project.id)
        .await?
        .into_iter()
        .filter(|email| *email != user.email)
        .collect();

    Ok(Parties {
        allocation_user,
        user,
        project,
        cc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_status_accepts_aliases() {
        let patch = ClusterAccessPatch {
            status: Some(" Complete ".into()),
            ..Default::default()
        };
        assert_eq!(requested_status(&patch), Some(ClusterAccessStatus::Active));
        assert_eq!(requested_status(&ClusterAccessPatch::default()), None);
    }
}
