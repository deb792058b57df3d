//! Cluster access request status workflow.
//!
//! A cluster access request moves `Pending - Add -> Processing -> Active`,
//! or to `Denied` from either open state. `Active` and `Denied` are
//! terminal. Completing a request requires a completion time, a cluster
//! username, and a cluster uid.
//!
//! [`plan_transition`] turns a raw patch into a [`Transition`] without
//! touching storage. Uniqueness of username / cluster uid needs the database
//! and is checked by the caller, which appends to the same message list.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Timestamp;
use crate::validation::ValidationErrors;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a cluster access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterAccessStatus {
    #[serde(rename = "Pending - Add")]
    PendingAdd,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "Denied")]
    Denied,
}

impl ClusterAccessStatus {
    pub const ALL: [ClusterAccessStatus; 4] = [
        Self::PendingAdd,
        Self::Processing,
        Self::Active,
        Self::Denied,
    ];

    /// Canonical name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingAdd => "Pending - Add",
            Self::Processing => "Processing",
            Self::Active => "Active",
            Self::Denied => "Denied",
        }
    }

    /// Parse a status name. `"Pending"` and `"Complete"` are accepted as
    /// aliases of `Pending - Add` and `Active`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Pending - Add" | "Pending" => Some(Self::PendingAdd),
            "Processing" => Some(Self::Processing),
            "Active" | "Complete" => Some(Self::Active),
            "Denied" => Some(Self::Denied),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Denied)
    }

    /// Statuses reachable from `self` in one step.
    pub fn allowed_transitions(&self) -> &'static [ClusterAccessStatus] {
        match self {
            Self::PendingAdd => &[Self::Processing, Self::Active, Self::Denied],
            Self::Processing => &[Self::PendingAdd, Self::Active, Self::Denied],
            Self::Active | Self::Denied => &[],
        }
    }

    pub fn can_transition_to(&self, target: ClusterAccessStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl fmt::Display for ClusterAccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub const MSG_NO_COMPLETION_TIME: &str = "No completion_time is given.";
pub const MSG_NO_USERNAME: &str = "No username is given.";
pub const MSG_NO_CLUSTER_UID: &str = "No cluster_uid is given.";

pub const MSG_BAD_DATETIME: &str = "Datetime has wrong format. Use one of these formats instead: \
     YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";

pub const MSG_BAD_USERNAME: &str = "Enter a valid username. This value may contain only \
     letters, numbers, and @/./+/-/_ characters.";

pub const MSG_BAD_CLUSTER_UID: &str =
    "Ensure cluster_uid is a number with at most 10 digits.";

pub const MSG_COMPLETION_FIELDS_WITHOUT_COMPLETE: &str =
    "completion_time, username and cluster_uid may only be given when completing a request.";

pub fn unknown_status_message(name: &str) -> String {
    format!("Object with name={name} does not exist.")
}

pub fn bad_transition_message(from: ClusterAccessStatus, to: ClusterAccessStatus) -> String {
    format!("Cannot change status from {from} to {to}.")
}

pub fn username_taken_message(username: &str) -> String {
    format!("A user with username {username} already exists.")
}

pub fn cluster_uid_taken_message(cluster_uid: &str) -> String {
    format!("A user with cluster_uid {cluster_uid} already exists.")
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Raw PATCH input. Every field is optional and unparsed; blank strings
/// count as absent. `cluster_uid` may also arrive as a JSON number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterAccessPatch {
    pub status: Option<String>,
    pub completion_time: Option<String>,
    pub username: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cluster_uid: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    }))
}

/// The stored state of the request being patched.
#[derive(Debug, Clone, Copy)]
pub struct CurrentRequest<'a> {
    pub status: ClusterAccessStatus,
    pub completion_time: Option<Timestamp>,
    pub username: Option<&'a str>,
    pub cluster_uid: Option<&'a str>,
}

/// Validated fields required to complete a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFields {
    pub completion_time: Timestamp,
    pub username: String,
    pub cluster_uid: String,
}

/// What a valid patch asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing would change; no write, no history, no email.
    NoOp,
    /// Plain status move between open states.
    Move(ClusterAccessStatus),
    /// Activate cluster access.
    Complete(CompletionFields),
    /// Deny the request. Carries an explicit completion time when given.
    Deny(Option<Timestamp>),
}

impl Transition {
    /// Status the request will have after the transition, if it changes.
    pub fn target(&self) -> Option<ClusterAccessStatus> {
        match self {
            Self::NoOp => None,
            Self::Move(s) => Some(*s),
            Self::Complete(_) => Some(ClusterAccessStatus::Active),
            Self::Deny(_) => Some(ClusterAccessStatus::Denied),
        }
    }
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("valid regex"));

static CLUSTER_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,10}$").expect("valid regex"));

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn is_valid_cluster_uid(cluster_uid: &str) -> bool {
    CLUSTER_UID_RE.is_match(cluster_uid)
}

/// Parse an RFC 3339 timestamp into UTC, truncated to the microsecond
/// precision the database keeps.
pub fn parse_completion_time(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(6))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Validate a patch against the stored request and decide the transition.
///
/// All problems are collected; the result is `Err` with every message when
/// any check fails. Missing completion fields are reported in the order
/// completion_time, username, cluster_uid.
pub fn plan_transition(
    current: CurrentRequest<'_>,
    patch: &ClusterAccessPatch,
) -> Result<Transition, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let target = match non_blank(&patch.status) {
        Some(name) => match ClusterAccessStatus::from_name(name) {
            Some(status) => Some(status),
            None => {
                errors.push_invalid(Some("status"), unknown_status_message(name));
                None
            }
        },
        None => Some(current.status),
    };

    let raw_time = non_blank(&patch.completion_time);
    let completion_time = match raw_time {
        Some(raw) => match parse_completion_time(raw) {
            Some(ts) => Some(ts),
            None => {
                errors.push_invalid(Some("completion_time"), MSG_BAD_DATETIME);
                None
            }
        },
        None => None,
    };
    let username = non_blank(&patch.username);
    let cluster_uid = non_blank(&patch.cluster_uid);

    let Some(target) = target else {
        return Err(errors);
    };

    if target == ClusterAccessStatus::Active {
        if raw_time.is_none() {
            errors.push_missing(MSG_NO_COMPLETION_TIME);
        }
        match username {
            None => errors.push_missing(MSG_NO_USERNAME),
            Some(u) if !is_valid_username(u) => {
                errors.push_invalid(Some("username"), MSG_BAD_USERNAME)
            }
            Some(_) => {}
        }
        match cluster_uid {
            None => errors.push_missing(MSG_NO_CLUSTER_UID),
            Some(c) if !is_valid_cluster_uid(c) => {
                errors.push_invalid(Some("cluster_uid"), MSG_BAD_CLUSTER_UID)
            }
            Some(_) => {}
        }
    } else if username.is_some()
        || cluster_uid.is_some()
        || (raw_time.is_some() && target != ClusterAccessStatus::Denied)
    {
        errors.push_invalid(None, MSG_COMPLETION_FIELDS_WITHOUT_COMPLETE);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    if target == current.status {
        let unchanged = match target {
            ClusterAccessStatus::Active => {
                completion_time == current.completion_time
                    && username == current.username
                    && cluster_uid == current.cluster_uid
            }
            ClusterAccessStatus::Denied => {
                completion_time.is_none() || completion_time == current.completion_time
            }
            _ => true,
        };
        if unchanged {
            return Ok(Transition::NoOp);
        }
    }

    if !current.status.can_transition_to(target) {
        errors.push_invalid(Some("status"), bad_transition_message(current.status, target));
        return Err(errors);
    }

    Ok(match target {
        ClusterAccessStatus::Active => Transition::Complete(CompletionFields {
            // Presence was checked above.
            completion_time: completion_time.unwrap_or_else(Utc::now),
            username: username.unwrap_or_default().to_string(),
            cluster_uid: cluster_uid.unwrap_or_default().to_string(),
        }),
        ClusterAccessStatus::Denied => Transition::Deny(completion_time),
        other => Transition::Move(other),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn pending() -> CurrentRequest<'static> {
        CurrentRequest {
            status: ClusterAccessStatus::PendingAdd,
            completion_time: None,
            username: None,
            cluster_uid: None,
        }
    }

    fn patch(status: &str) -> ClusterAccessPatch {
        ClusterAccessPatch {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn complete_patch() -> ClusterAccessPatch {
        ClusterAccessPatch {
            status: Some("Active".into()),
            completion_time: Some("2024-03-01T12:00:00Z".into()),
            username: Some("alice".into()),
            cluster_uid: Some("1234".into()),
        }
    }

    #[test]
    fn aliases_parse_to_canonical_statuses() {
        assert_eq!(
            ClusterAccessStatus::from_name("Complete"),
            Some(ClusterAccessStatus::Active)
        );
        assert_eq!(ClusterAccessStatus::Active.as_str(), "Active");
        assert_eq!(
            ClusterAccessStatus::from_name("Pending"),
            Some(ClusterAccessStatus::PendingAdd)
        );
        assert_eq!(ClusterAccessStatus::from_name("Invalid"), None);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in ClusterAccessStatus::ALL {
            assert_eq!(status.is_terminal(), status.allowed_transitions().is_empty());
        }
    }

    #[test]
    fn completing_without_fields_reports_three_messages_in_order() {
        let errors = plan_transition(pending(), &patch("Active")).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec![MSG_NO_COMPLETION_TIME, MSG_NO_USERNAME, MSG_NO_CLUSTER_UID]
        );
    }

    #[test]
    fn each_missing_field_yields_one_message() {
        let mut p = complete_patch();
        p.username = None;
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(errors.messages(), vec![MSG_NO_USERNAME]);

        let mut p = complete_patch();
        p.cluster_uid = Some("   ".into());
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(errors.messages(), vec![MSG_NO_CLUSTER_UID]);
    }

    #[test]
    fn complete_patch_produces_completion_fields() {
        let transition = plan_transition(pending(), &complete_patch()).unwrap();
        assert_matches!(transition, Transition::Complete(fields) => {
            assert_eq!(fields.username, "alice");
            assert_eq!(fields.cluster_uid, "1234");
            assert_eq!(
                fields.completion_time,
                Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            );
        });
    }

    #[test]
    fn invalid_status_and_datetime_are_both_reported() {
        let p = ClusterAccessPatch {
            status: Some("Invalid".into()),
            completion_time: Some("Invalid".into()),
            ..Default::default()
        };
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec!["Object with name=Invalid does not exist.", MSG_BAD_DATETIME]
        );
    }

    #[test]
    fn malformed_username_and_uid_are_invalid_not_missing() {
        let mut p = complete_patch();
        p.username = Some("bad name!".into());
        p.cluster_uid = Some("12ab".into());
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(errors.messages(), vec![MSG_BAD_USERNAME, MSG_BAD_CLUSTER_UID]);
    }

    #[test]
    fn processing_move_is_planned() {
        let t = plan_transition(pending(), &patch("Processing")).unwrap();
        assert_eq!(t, Transition::Move(ClusterAccessStatus::Processing));
    }

    #[test]
    fn deny_is_allowed_from_processing() {
        let current = CurrentRequest {
            status: ClusterAccessStatus::Processing,
            ..pending()
        };
        assert_eq!(
            plan_transition(current, &patch("Denied")).unwrap(),
            Transition::Deny(None)
        );
    }

    #[test]
    fn terminal_status_rejects_moves() {
        let current = CurrentRequest {
            status: ClusterAccessStatus::Denied,
            completion_time: Some(Utc::now()),
            ..pending()
        };
        let errors = plan_transition(current, &patch("Processing")).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec!["Cannot change status from Denied to Processing."]
        );
    }

    #[test]
    fn identical_resubmission_of_complete_is_noop() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let current = CurrentRequest {
            status: ClusterAccessStatus::Active,
            completion_time: Some(ts),
            username: Some("alice"),
            cluster_uid: Some("1234"),
        };
        assert_eq!(
            plan_transition(current, &complete_patch()).unwrap(),
            Transition::NoOp
        );
    }

    #[test]
    fn changing_a_complete_request_is_rejected() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let current = CurrentRequest {
            status: ClusterAccessStatus::Active,
            completion_time: Some(ts),
            username: Some("alice"),
            cluster_uid: Some("9999"),
        };
        let errors = plan_transition(current, &complete_patch()).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec!["Cannot change status from Active to Active."]
        );
    }

    #[test]
    fn empty_patch_is_noop() {
        assert_eq!(
            plan_transition(pending(), &ClusterAccessPatch::default()).unwrap(),
            Transition::NoOp
        );
    }

    #[test]
    fn completion_fields_need_complete_status() {
        let p = ClusterAccessPatch {
            status: Some("Processing".into()),
            username: Some("alice".into()),
            ..Default::default()
        };
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(errors.messages(), vec![MSG_COMPLETION_FIELDS_WITHOUT_COMPLETE]);
    }

    #[test]
    fn completion_time_is_truncated_to_microseconds() {
        let ts = parse_completion_time("2024-03-01T12:00:00.1234567Z").unwrap();
        assert_eq!(ts.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn sub_microsecond_resubmission_is_noop() {
        let p = ClusterAccessPatch {
            completion_time: Some("2024-03-01T12:00:00.1234567Z".into()),
            ..complete_patch()
        };
        let Transition::Complete(fields) = plan_transition(pending(), &p).unwrap() else {
            panic!("expected completion");
        };
        let current = CurrentRequest {
            status: ClusterAccessStatus::Active,
            completion_time: Some(fields.completion_time),
            username: Some("alice"),
            cluster_uid: Some("1234"),
        };
        assert_eq!(plan_transition(current, &p).unwrap(), Transition::NoOp);
    }

    #[test]
    fn numeric_cluster_uid_is_accepted() {
        let p: ClusterAccessPatch =
            serde_json::from_str(r#"{"status": "Active", "cluster_uid": 4242}"#).unwrap();
        assert_eq!(p.cluster_uid.as_deref(), Some("4242"));

        let p: ClusterAccessPatch = serde_json::from_str(r#"{"status": "Active"}"#).unwrap();
        assert_eq!(p.cluster_uid, None);
    }

    #[test]
    fn denial_rejects_username_and_uid() {
        let p = ClusterAccessPatch {
            status: Some("Denied".into()),
            username: Some("alice".into()),
            cluster_uid: Some("1234".into()),
            ..Default::default()
        };
        let errors = plan_transition(pending(), &p).unwrap_err();
        assert_eq!(errors.messages(), vec![MSG_COMPLETION_FIELDS_WITHOUT_COMPLETE]);

        let p = ClusterAccessPatch {
            status: Some("Denied".into()),
            completion_time: Some("2024-03-01T12:00:00Z".into()),
            ..Default::default()
        };
        assert_matches!(plan_transition(pending(), &p), Ok(Transition::Deny(Some(_))));
    }

    #[test]
    fn username_shape() {
        assert!(is_valid_username("user.name-01"));
        assert!(is_valid_username("a@b+c_d"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(151)));
    }

    #[test]
    fn cluster_uid_shape() {
        assert!(is_valid_cluster_uid("1234"));
        assert!(!is_valid_cluster_uid("12345678901"));
        assert!(!is_valid_cluster_uid("-1"));
    }
}
