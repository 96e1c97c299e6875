use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    registration::{RegistrationStatus, SessionRegistration},
    scan::{CreateScanData, ScanRecord},
    session::{BoothRestriction, Session},
};

/// Status of entrance (boothless) check-in scans. Booth scans always get
/// one of the four classified statuses.
pub const REGULAR_STATUS: &str = "regular";

/// Outcome category of a badge scan at a booth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classification {
    /// The attendee holds a registration expecting this booth.
    Expected {
        session_id: Uuid,
        registration_id: Uuid,
    },
    /// The session admits walk-ins and the attendee holds no registration.
    WalkIn { session_id: Uuid },
    /// Restricted booth, or registration required and none held.
    WrongBooth {
        session_id: Uuid,
        expected_booth_id: Option<Uuid>,
    },
    /// No session is active at this booth at scan time.
    OutOfSchedule,
}

impl Classification {
    /// Returns the scan status as a string for the scan log
    pub fn status(&self) -> &'static str {
        match self {
            Classification::Expected { .. } => "expected",
            Classification::WalkIn { .. } => "walk_in",
            Classification::WrongBooth { .. } => "wrong_booth",
            Classification::OutOfSchedule => "out_of_schedule",
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Classification::Expected { session_id, .. }
            | Classification::WalkIn { session_id }
            | Classification::WrongBooth { session_id, .. } => Some(*session_id),
            Classification::OutOfSchedule => None,
        }
    }

    pub fn expected_booth_id(&self) -> Option<Uuid> {
        match self {
            Classification::WrongBooth {
                expected_booth_id, ..
            } => *expected_booth_id,
            _ => None,
        }
    }

    /// The registration to flip to `attended`, if any
    pub fn registration_to_mark(&self) -> Option<Uuid> {
        match self {
            Classification::Expected {
                registration_id, ..
            } => Some(*registration_id),
            _ => None,
        }
    }
}

/// Decides the outcome of a scan at `booth_id`.
///
/// `active_sessions` are the sessions whose window contains the scan time at
/// that booth; `registrations` is the attendee's non-cancelled set. Pure —
/// never touches I/O and never fails: missing data degrades to
/// `OutOfSchedule`/`WrongBooth`.
///
/// When several sessions overlap at one booth, candidates are evaluated in
/// `(starts_at, id)` order, so the earliest-starting session wins each rule.
pub fn classify(
    booth_id: Uuid,
    active_sessions: &[Session],
    registrations: &[SessionRegistration],
) -> Classification {
    let mut candidates: Vec<&Session> = active_sessions.iter().collect();
    candidates.sort_by_key(|s| (s.starts_at, s.id));

    if candidates.is_empty() {
        return Classification::OutOfSchedule;
    }

    let held: Vec<&SessionRegistration> = registrations
        .iter()
        .filter(|r| r.status != RegistrationStatus::Cancelled.as_str())
        .collect();

    // A registration expecting this booth, or one with no booth commitment
    // for a session running here, is an expected arrival.
    for session in &candidates {
        let matching = held.iter().find(|r| {
            r.session_id == session.id
                && (r.expected_booth_id == Some(booth_id) || r.expected_booth_id.is_none())
        });
        if let Some(registration) = matching {
            return Classification::Expected {
                session_id: session.id,
                registration_id: registration.id,
            };
        }
    }

    // Assigned-only booths reject attendees committed elsewhere.
    for session in &candidates {
        if session.restriction() != BoothRestriction::Assigned {
            continue;
        }
        let elsewhere = held.iter().find(|r| {
            r.session_id == session.id
                && r.expected_booth_id.is_some()
                && r.expected_booth_id != Some(booth_id)
        });
        if let Some(registration) = elsewhere {
            return Classification::WrongBooth {
                session_id: session.id,
                expected_booth_id: registration.expected_booth_id,
            };
        }
    }

    // Unregistered attendee: admitted where walk-ins are allowed.
    for session in &candidates {
        let holds_any = held.iter().any(|r| r.session_id == session.id);
        if session.allows_walk_ins && !holds_any {
            return Classification::WalkIn {
                session_id: session.id,
            };
        }
    }

    // Registration required and none matched.
    let first = candidates[0];
    let expected_booth_id = held
        .iter()
        .find(|r| r.session_id == first.id)
        .and_then(|r| r.expected_booth_id);

    Classification::WrongBooth {
        session_id: first.id,
        expected_booth_id,
    }
}

/// What happened to the classified scan on the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PersistOutcome {
    /// Written through; `attended_marked` says whether this scan performed
    /// the registration transition.
    Stored {
        scan: ScanRecord,
        attended_marked: bool,
    },
    /// The remote write failed; the caller should spool `scan` (and the
    /// pending registration transition) into the offline queue.
    Deferred {
        scan: CreateScanData,
        mark_attended: Option<Uuid>,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedScan {
    pub classification: Classification,
    pub outcome: PersistOutcome,
}

/// Classifies a scan and writes it through to the remote store.
///
/// Remote *reads* failing propagate as errors (the caller reports a
/// retryable failure); a remote *write* failing degrades to
/// `PersistOutcome::Deferred` so the scan is never lost.
#[tracing::instrument(skip(pool))]
pub async fn record_scan(
    pool: &PgPool,
    event_id: Uuid,
    attendee_id: Uuid,
    booth_id: Uuid,
    scanned_at: DateTime<Utc>,
) -> Result<RecordedScan, sqlx::Error> {
    let active_sessions = Session::list_active_at_booth(pool, booth_id, scanned_at).await?;
    let registrations = SessionRegistration::list_active_for_attendee(pool, attendee_id).await?;

    let classification = classify(booth_id, &active_sessions, &registrations);

    tracing::info!(
        scan_status = classification.status(),
        session_id = ?classification.session_id(),
        "Classified scan"
    );

    let data = CreateScanData {
        event_id,
        attendee_id,
        booth_id: Some(booth_id),
        session_id: classification.session_id(),
        expected_booth_id: classification.expected_booth_id(),
        scanned_at,
        scan_status: classification.status().to_string(),
        notes: None,
    };
    let mark = classification.registration_to_mark();

    let outcome = match persist(pool, &data, mark).await {
        Ok((scan, attended_marked)) => PersistOutcome::Stored {
            scan,
            attended_marked,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Scan write failed, deferring to offline queue");
            PersistOutcome::Deferred {
                scan: data,
                mark_attended: mark,
                error: e.to_string(),
            }
        }
    };

    Ok(RecordedScan {
        classification,
        outcome,
    })
}

async fn persist(
    pool: &PgPool,
    data: &CreateScanData,
    mark_attended: Option<Uuid>,
) -> Result<(ScanRecord, bool), sqlx::Error> {
    let scan = ScanRecord::create(pool, data.clone()).await?;

    let attended_marked = match mark_attended {
        Some(registration_id) => SessionRegistration::mark_attended(pool, registration_id).await?,
        None => false,
    };

    Ok((scan, attended_marked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn session_at(booth: Option<Uuid>, starts_at: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            booth_id: booth,
            title: "Session".to_string(),
            starts_at,
            ends_at: starts_at + Duration::hours(1),
            scanning_context: "booth_meeting".to_string(),
            requires_pre_assignment: false,
            allows_walk_ins: true,
            has_capacity: false,
            max_capacity: None,
            booth_restriction: "none".to_string(),
            created_at: starts_at,
        }
    }

    fn registration_for(
        attendee_id: Uuid,
        session: &Session,
        expected_booth_id: Option<Uuid>,
    ) -> SessionRegistration {
        SessionRegistration {
            id: Uuid::new_v4(),
            attendee_id,
            session_id: session.id,
            event_id: session.event_id,
            expected_booth_id,
            status: "registered".to_string(),
            registration_time: session.starts_at - Duration::days(1),
        }
    }

    #[test]
    fn test_no_active_session_is_out_of_schedule() {
        let booth = Uuid::new_v4();
        assert_eq!(
            classify(booth, &[], &[]),
            Classification::OutOfSchedule
        );
    }

    #[test]
    fn test_matching_expected_booth_is_expected() {
        let booth = Uuid::new_v4();
        let session = session_at(Some(booth), window_start());
        let attendee = Uuid::new_v4();
        let registration = registration_for(attendee, &session, Some(booth));
        let registration_id = registration.id;

        let result = classify(booth, &[session.clone()], &[registration]);

        assert_eq!(
            result,
            Classification::Expected {
                session_id: session.id,
                registration_id,
            }
        );
    }

    #[test]
    fn test_boothless_registration_counts_as_expected() {
        let booth = Uuid::new_v4();
        let session = session_at(Some(booth), window_start());
        let registration = registration_for(Uuid::new_v4(), &session, None);
        let registration_id = registration.id;

        let result = classify(booth, &[session.clone()], &[registration]);

        assert_eq!(
            result,
            Classification::Expected {
                session_id: session.id,
                registration_id,
            }
        );
    }

    #[test]
    fn test_unregistered_at_walk_in_session_is_walk_in() {
        let booth = Uuid::new_v4();
        let session = session_at(Some(booth), window_start());

        let result = classify(booth, &[session.clone()], &[]);

        assert_eq!(
            result,
            Classification::WalkIn {
                session_id: session.id
            }
        );
    }

    #[test]
    fn test_assigned_restriction_rejects_other_booth() {
        let scanned_booth = Uuid::new_v4();
        let expected_booth = Uuid::new_v4();
        let mut session = session_at(Some(scanned_booth), window_start());
        session.booth_restriction = "assigned".to_string();

        let registration = registration_for(Uuid::new_v4(), &session, Some(expected_booth));

        let result = classify(scanned_booth, &[session.clone()], &[registration]);

        assert_eq!(
            result,
            Classification::WrongBooth {
                session_id: session.id,
                expected_booth_id: Some(expected_booth),
            }
        );
    }

    #[test]
    fn test_no_registration_and_no_walk_ins_is_wrong_booth() {
        let booth = Uuid::new_v4();
        let mut session = session_at(Some(booth), window_start());
        session.allows_walk_ins = false;

        let result = classify(booth, &[session.clone()], &[]);

        assert_eq!(
            result,
            Classification::WrongBooth {
                session_id: session.id,
                expected_booth_id: None,
            }
        );
    }

    #[test]
    fn test_cancelled_registration_is_ignored() {
        let booth = Uuid::new_v4();
        let session = session_at(Some(booth), window_start());
        let mut registration = registration_for(Uuid::new_v4(), &session, Some(booth));
        registration.status = "cancelled".to_string();

        // With the booking cancelled the attendee is a plain walk-in.
        let result = classify(booth, &[session.clone()], &[registration]);

        assert_eq!(
            result,
            Classification::WalkIn {
                session_id: session.id
            }
        );
    }

    #[test]
    fn test_overlapping_sessions_tie_break_on_start_time() {
        let booth = Uuid::new_v4();
        let earlier = session_at(Some(booth), window_start());
        let later = session_at(Some(booth), window_start() + Duration::minutes(15));

        // Both admit walk-ins; the earliest start wins regardless of input order.
        let result = classify(booth, &[later.clone(), earlier.clone()], &[]);

        assert_eq!(
            result,
            Classification::WalkIn {
                session_id: earlier.id
            }
        );
    }

    #[test]
    fn test_simultaneous_sessions_tie_break_on_id() {
        let booth = Uuid::new_v4();
        let a = session_at(Some(booth), window_start());
        let b = session_at(Some(booth), window_start());
        let winner = std::cmp::min(a.id, b.id);

        let forward = classify(booth, &[a.clone(), b.clone()], &[]);
        let reversed = classify(booth, &[b, a], &[]);

        assert_eq!(forward, reversed);
        assert_eq!(
            forward,
            Classification::WalkIn { session_id: winner }
        );
    }

    #[test]
    fn test_registration_for_later_session_still_matches_it() {
        let booth = Uuid::new_v4();
        let earlier = session_at(Some(booth), window_start());
        let later = session_at(Some(booth), window_start() + Duration::minutes(15));
        let registration = registration_for(Uuid::new_v4(), &later, Some(booth));
        let registration_id = registration.id;

        // The registration match outranks the earlier session's walk-in rule.
        let result = classify(booth, &[earlier, later.clone()], &[registration]);

        assert_eq!(
            result,
            Classification::Expected {
                session_id: later.id,
                registration_id,
            }
        );
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Classification::OutOfSchedule.status(), "out_of_schedule");
        assert_eq!(
            Classification::WalkIn {
                session_id: Uuid::new_v4()
            }
            .status(),
            "walk_in"
        );
    }
}
