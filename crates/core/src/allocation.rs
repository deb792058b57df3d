//! Allocation lifecycle rules and allocation change requests.
//!
//! Status names match the lookup values the allocation tables store. The
//! planning functions here are pure; the API layer wraps them in a
//! transaction and writes history.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Date;
use crate::validation::ValidationErrors;

// ---------------------------------------------------------------------------
// Name-mapped status enums
// ---------------------------------------------------------------------------

macro_rules! define_named_status {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Name as stored in the database.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $label => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_named_status! {
    /// Allocation lifecycle status.
    AllocationStatus {
        New => "New",
        Active => "Active",
        Denied => "Denied",
        Expired => "Expired",
        RenewalRequested => "Renewal Requested",
        Revoked => "Revoked",
        Inactive => "Inactive",
        PaymentPending => "Payment Pending",
        PaymentRequested => "Payment Requested",
        Paid => "Paid",
        Unpaid => "Unpaid",
    }
}

define_named_status! {
    /// Membership status of a user within an allocation.
    AllocationUserStatus {
        Active => "Active",
        Error => "Error",
        Removed => "Removed",
        PendingRemove => "Pending - Remove",
    }
}

define_named_status! {
    /// Status of an allocation change request.
    ChangeRequestStatus {
        Pending => "Pending",
        Approved => "Approved",
        Denied => "Denied",
    }
}

/// Allocation user attribute tracking a user's cluster account.
pub const CLUSTER_ACCOUNT_STATUS_ATTRIBUTE: &str = "Cluster Account Status";

/// Allocation / allocation user attribute holding service units.
pub const SERVICE_UNITS_ATTRIBUTE: &str = "Service Units";

// ---------------------------------------------------------------------------
// Allocation status transitions
// ---------------------------------------------------------------------------

impl AllocationStatus {
    /// Statuses an allocation may move to from `self`.
    pub fn allowed_transitions(&self) -> &'static [AllocationStatus] {
        use AllocationStatus::*;
        match self {
            New => &[Active, Denied, PaymentPending],
            PaymentPending => &[PaymentRequested, Active, Denied],
            PaymentRequested => &[Paid, Unpaid, Active, Denied],
            Paid | Unpaid => &[Active, Inactive],
            Active => &[RenewalRequested, Expired, Inactive, Revoked],
            RenewalRequested => &[Active, Denied, Expired],
            Inactive => &[Active, Expired],
            Expired | Denied | Revoked => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Dates of the allocation being changed.
#[derive(Debug, Clone, Copy)]
pub struct AllocationDates {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

/// Check a requested allocation status change. All problems are collected.
pub fn plan_allocation_status_change(
    current: AllocationStatus,
    target: AllocationStatus,
    dates: AllocationDates,
    today: Date,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if current == target {
        errors.push_invalid(Some("status"), format!("Allocation already has status {target}."));
        return Err(errors);
    }

    if !current.allowed_transitions().contains(&target) {
        errors.push_invalid(
            Some("status"),
            format!("Cannot change allocation status from {current} to {target}."),
        );
    }

    match target {
        AllocationStatus::Active => {
            if dates.start_date.is_none() {
                errors.push_missing("You have to set the start date.");
            }
        }
        AllocationStatus::Expired => {
            if let Some(end) = dates.end_date {
                if end > today {
                    errors.push_invalid(Some("end_date"), "End date cannot be greater than today.");
                }
                if let Some(start) = dates.start_date {
                    if start > end {
                        errors.push_invalid(
                            Some("end_date"),
                            "End date cannot be before start date.",
                        );
                    }
                }
            }
        }
        _ => {}
    }

    errors.into_result(())
}

// ---------------------------------------------------------------------------
// Change requests
// ---------------------------------------------------------------------------

/// Default end-date extensions (in days) a change request may ask for.
pub const DEFAULT_EXTENSION_DAYS: &[i32] = &[30, 60, 90];

impl ChangeRequestStatus {
    pub fn can_transition_to(&self, target: ChangeRequestStatus) -> bool {
        matches!(
            (self, target),
            (ChangeRequestStatus::Pending, ChangeRequestStatus::Approved)
                | (ChangeRequestStatus::Pending, ChangeRequestStatus::Denied)
        )
    }
}

/// The allocation state a new change request is checked against.
#[derive(Debug, Clone, Copy)]
pub struct ChangeTarget {
    pub status: AllocationStatus,
    pub is_changeable: bool,
    pub is_locked: bool,
    pub has_pending_request: bool,
}

/// One proposed attribute value in a change request.
#[derive(Debug, Clone)]
pub struct ProposedAttributeChange<'a> {
    pub attribute_name: &'a str,
    pub new_value: &'a str,
}

/// Validate a new change request. Returns every problem at once.
pub fn validate_change_request(
    target: ChangeTarget,
    end_date_extension: Option<i32>,
    attribute_changes: &[ProposedAttributeChange<'_>],
    allowed_extension_days: &[i32],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if target.status != AllocationStatus::Active {
        errors.push_invalid(
            None,
            format!("Only Active allocations can be changed; this allocation is {}.", target.status),
        );
    }
    if !target.is_changeable {
        errors.push_invalid(None, "This allocation is not changeable.");
    }
    if target.is_locked {
        errors.push_invalid(None, "This allocation is locked.");
    }
    if target.has_pending_request {
        errors.push_conflict("This allocation already has a pending change request.");
    }

    if let Some(days) = end_date_extension {
        if !allowed_extension_days.contains(&days) {
            let allowed: Vec<String> = allowed_extension_days.iter().map(|d| d.to_string()).collect();
            errors.push_invalid(
                Some("end_date_extension"),
                format!(
                    "end_date_extension must be one of: {} days.",
                    allowed.join(", ")
                ),
            );
        }
    }

    if end_date_extension.is_none() && attribute_changes.is_empty() {
        errors.push_missing("No changes are requested.");
    }

    for change in attribute_changes {
        if change.new_value.trim().is_empty() {
            errors.push_invalid(
                Some("attribute_changes"),
                format!("No new value is given for {}.", change.attribute_name),
            );
        }
    }

    errors.into_result(())
}

/// Extend an end date by a number of days. A missing end date stays missing.
pub fn extend_end_date(end_date: Option<Date>, days: i32) -> Option<Date> {
    end_date.map(|d| d + Duration::days(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn changeable() -> ChangeTarget {
        ChangeTarget {
            status: AllocationStatus::Active,
            is_changeable: true,
            is_locked: false,
            has_pending_request: false,
        }
    }

    #[test]
    fn names_round_trip_through_from_name() {
        for s in AllocationStatus::ALL {
            assert_eq!(AllocationStatus::from_name(s.as_str()), Some(*s));
        }
        assert_eq!(
            AllocationUserStatus::from_name("Pending - Remove"),
            Some(AllocationUserStatus::PendingRemove)
        );
        assert_eq!(ChangeRequestStatus::from_name("Maybe"), None);
    }

    #[test]
    fn activation_requires_start_date() {
        let dates = AllocationDates { start_date: None, end_date: None };
        let errs = plan_allocation_status_change(
            AllocationStatus::New,
            AllocationStatus::Active,
            dates,
            date(2024, 1, 1),
        )
        .unwrap_err();
        assert_eq!(errs.messages(), vec!["You have to set the start date."]);
    }

    #[test]
    fn expiry_rejects_future_end_date() {
        let dates = AllocationDates {
            start_date: Some(date(2023, 1, 1)),
            end_date: Some(date(2025, 1, 1)),
        };
        let errs = plan_allocation_status_change(
            AllocationStatus::Active,
            AllocationStatus::Expired,
            dates,
            date(2024, 6, 1),
        )
        .unwrap_err();
        assert_eq!(errs.messages(), vec!["End date cannot be greater than today."]);
    }

    #[test]
    fn expiry_after_end_date_is_allowed() {
        let dates = AllocationDates {
            start_date: Some(date(2023, 1, 1)),
            end_date: Some(date(2024, 1, 1)),
        };
        assert!(plan_allocation_status_change(
            AllocationStatus::Active,
            AllocationStatus::Expired,
            dates,
            date(2024, 6, 1),
        )
        .is_ok());
    }

    #[test]
    fn terminal_allocation_statuses() {
        assert!(AllocationStatus::Expired.is_terminal());
        assert!(AllocationStatus::Denied.is_terminal());
        assert!(!AllocationStatus::Active.is_terminal());
    }

    #[test]
    fn moving_out_of_a_terminal_status_is_rejected() {
        let dates = AllocationDates {
            start_date: Some(date(2023, 1, 1)),
            end_date: None,
        };
        let errs = plan_allocation_status_change(
            AllocationStatus::Denied,
            AllocationStatus::Active,
            dates,
            date(2024, 1, 1),
        )
        .unwrap_err();
        assert_eq!(
            errs.messages(),
            vec!["Cannot change allocation status from Denied to Active."]
        );
    }

    #[test]
    fn change_request_problems_are_aggregated() {
        let target = ChangeTarget {
            status: AllocationStatus::Expired,
            is_changeable: false,
            is_locked: true,
            has_pending_request: true,
        };
        let errs = validate_change_request(target, Some(45), &[], DEFAULT_EXTENSION_DAYS)
            .unwrap_err();
        assert_eq!(errs.len(), 5);
        assert!(errs.messages()[4].contains("30, 60, 90"));
    }

    #[test]
    fn change_request_needs_some_change() {
        let errs = validate_change_request(changeable(), None, &[], DEFAULT_EXTENSION_DAYS)
            .unwrap_err();
        assert_eq!(errs.messages(), vec!["No changes are requested."]);
    }

    #[test]
    fn blank_attribute_value_is_rejected() {
        let changes = [ProposedAttributeChange {
            attribute_name: "Storage Quota (TB)",
            new_value: " ",
        }];
        let errs = validate_change_request(changeable(), None, &changes, DEFAULT_EXTENSION_DAYS)
            .unwrap_err();
        assert_eq!(
            errs.messages(),
            vec!["No new value is given for Storage Quota (TB)."]
        );
    }

    #[test]
    fn valid_extension_passes() {
        assert!(validate_change_request(changeable(), Some(60), &[], DEFAULT_EXTENSION_DAYS).is_ok());
    }

    #[test]
    fn only_pending_change_requests_move() {
        use ChangeRequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Denied));
        assert!(!Approved.can_transition_to(Denied));
        assert!(!Denied.can_transition_to(Approved));
    }

    #[test]
    fn extend_end_date_adds_days() {
        assert_eq!(
            extend_end_date(Some(date(2024, 1, 31)), 30),
            Some(date(2024, 3, 1))
        );
        assert_eq!(extend_end_date(None, 30), None);
    }
}
