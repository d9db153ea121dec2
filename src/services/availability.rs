//! Vehicle availability rules shared by the lookup, the single-vehicle
//! check and route commit.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::types::{Shift, UnavailableReason, Vehicle, VehicleAvailability};

/// Time window a route occupies its vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RouteWindow {
    /// Window starting at the shift's departure on `date`.
    pub fn for_shift(shift: &Shift, date: NaiveDate, minutes: i64) -> Self {
        let start = Utc.from_utc_datetime(&shift.departure_on(date));
        Self {
            start,
            end: start + Duration::minutes(minutes.max(0)),
        }
    }

    /// Explicit bounds, each defaulting to the shift window.
    pub fn with_bounds(
        shift: &Shift,
        date: NaiveDate,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        default_minutes: i64,
    ) -> Self {
        let default = Self::for_shift(shift, date, default_minutes);
        let start = start.map(|s| Utc.from_utc_datetime(&s)).unwrap_or(default.start);
        let end = end
            .map(|e| Utc.from_utc_datetime(&e))
            .unwrap_or_else(|| start + Duration::minutes(default_minutes.max(0)));
        Self { start, end }
    }

    /// Inclusive at both edges: a route ending exactly when this window
    /// starts still conflicts. Same predicate as the conflict queries.
    #[cfg(test)]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= end && start <= self.end
    }
}

/// Facts gathered about one vehicle for a window
#[derive(Debug, Clone, Default)]
pub struct VehicleFacts<'a> {
    pub shift_found: bool,
    pub vehicle: Option<&'a Vehicle>,
    pub conflicting_routes: i64,
    pub marked_unavailable: bool,
}

/// First reason, in fixed order, that the vehicle cannot take the route.
pub fn evaluate(facts: &VehicleFacts<'_>) -> VehicleAvailability {
    if !facts.shift_found {
        return VehicleAvailability::unavailable(UnavailableReason::ShiftNotFound);
    }
    let Some(vehicle) = facts.vehicle else {
        return VehicleAvailability::unavailable(UnavailableReason::VehicleNotFound);
    };
    if let Some(reason) = vehicle.static_unavailability() {
        return VehicleAvailability::unavailable(reason);
    }
    if facts.conflicting_routes > 0 {
        return VehicleAvailability::unavailable(UnavailableReason::ConflictingRoute);
    }
    if facts.marked_unavailable {
        return VehicleAvailability::unavailable(UnavailableReason::MarkedUnavailable);
    }
    VehicleAvailability::available()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VehicleStatus;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn shift() -> Shift {
        Shift {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            name: "Day".into(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            time_zone: "UTC".into(),
            created_at: Utc::now(),
        }
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            name: "Coaster".into(),
            plate_number: "AA-3-12345".into(),
            category_id: None,
            category_name: None,
            capacity: 12,
            category_capacity: None,
            daily_rate: None,
            status: VehicleStatus::Available,
            is_active: true,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn test_window_for_shift() {
        let w = RouteWindow::for_shift(&shift(), date(), 90);
        assert_eq!(w.start.to_rfc3339(), "2026-03-02T17:00:00+00:00");
        assert_eq!(w.end.to_rfc3339(), "2026-03-02T18:30:00+00:00");
    }

    #[test]
    fn test_window_bounds_default_end_from_start() {
        let start = date().and_hms_opt(16, 0, 0).unwrap();
        let w = RouteWindow::with_bounds(&shift(), date(), Some(start), None, 30);
        assert_eq!(w.end.to_rfc3339(), "2026-03-02T16:30:00+00:00");
    }

    #[test]
    fn test_overlap_is_inclusive_at_edges() {
        let w = RouteWindow::for_shift(&shift(), date(), 60);
        assert!(w.overlaps(w.start - Duration::minutes(30), w.start + Duration::minutes(1)));
        // back-to-back routes share a boundary instant
        assert!(w.overlaps(w.start - Duration::minutes(30), w.start));
        assert!(w.overlaps(w.end, w.end + Duration::minutes(10)));
    }

    #[test]
    fn test_disjoint_windows_do_not_overlap() {
        let w = RouteWindow::for_shift(&shift(), date(), 60);
        assert!(!w.overlaps(w.end + Duration::minutes(1), w.end + Duration::minutes(30)));
        assert!(!w.overlaps(w.start - Duration::minutes(30), w.start - Duration::minutes(1)));
    }

    fn busy(v: &Vehicle) -> VehicleFacts<'_> {
        VehicleFacts {
            shift_found: true,
            vehicle: Some(v),
            conflicting_routes: 1,
            marked_unavailable: true,
        }
    }

    #[test]
    fn test_reasons_in_order() {
        let mut v = vehicle();

        assert_eq!(
            evaluate(&VehicleFacts::default()).reason,
            Some(UnavailableReason::ShiftNotFound)
        );
        assert_eq!(
            evaluate(&VehicleFacts { shift_found: true, ..Default::default() }).reason,
            Some(UnavailableReason::VehicleNotFound)
        );

        v.deleted = true;
        v.is_active = false;
        assert_eq!(evaluate(&busy(&v)).reason, Some(UnavailableReason::Deleted));
        v.deleted = false;
        assert_eq!(evaluate(&busy(&v)).reason, Some(UnavailableReason::NotActive));
        v.is_active = true;
        v.status = VehicleStatus::Maintenance;
        assert_eq!(evaluate(&busy(&v)).reason, Some(UnavailableReason::Maintenance));
        v.status = VehicleStatus::InUse;
        assert_eq!(evaluate(&busy(&v)).reason, Some(UnavailableReason::ConflictingRoute));

        let free = VehicleFacts {
            shift_found: true,
            vehicle: Some(&v),
            conflicting_routes: 0,
            marked_unavailable: true,
        };
        let result = evaluate(&free);
        assert_eq!(result.reason, Some(UnavailableReason::MarkedUnavailable));
        assert_eq!(result.message.as_deref(), Some("Vehicle is marked as unavailable"));
    }

    #[test]
    fn test_available_vehicle() {
        let v = vehicle();
        let result = evaluate(&VehicleFacts {
            shift_found: true,
            vehicle: Some(&v),
            conflicting_routes: 0,
            marked_unavailable: false,
        });
        assert!(result.available);
        assert!(result.reason.is_none());
    }
}
