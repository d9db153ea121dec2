//! Planning sessions
//!
//! A planning session holds the recommended clusters of one shift
//! clustering run and the planner's current selection: one shuttle and the
//! employees picked for it, in pick order. Sessions live in memory, are
//! owned by the organization that opened them and expire after a period of
//! inactivity.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::defaults::SESSION_TTL_MINUTES;
use crate::types::{
    ClusterRoute, Coordinates, EmployeeView, PlanningEmployee, PlanningSnapshot, ShuttleView,
    Vehicle,
};

/// Global session store shared by the planner handlers
pub static PLANNING_SESSIONS: Lazy<SessionStore> =
    Lazy::new(|| SessionStore::new(Duration::minutes(SESSION_TTL_MINUTES)));

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Unknown shuttle {0}")]
    UnknownShuttle(Uuid),
    #[error("Unknown employee {0}")]
    UnknownEmployee(Uuid),
    #[error("Select a shuttle before choosing employees")]
    ShuttleNotSelected,
    #[error("Employee {0} has no pickup stop")]
    EmployeeWithoutStop(Uuid),
    #[error("Shuttle has only {capacity} seats")]
    CapacityExceeded { capacity: u32 },
    #[error("Planning session belongs to another organization")]
    NotOwner,
    #[error("Planning session not found or expired")]
    SessionNotFound,
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownShuttle(_) => "UNKNOWN_SHUTTLE",
            Self::UnknownEmployee(_) => "UNKNOWN_EMPLOYEE",
            Self::ShuttleNotSelected => "SHUTTLE_NOT_SELECTED",
            Self::EmployeeWithoutStop(_) => "EMPLOYEE_WITHOUT_STOP",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::NotOwner => "NOT_OWNER",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionShuttle {
    pub id: Uuid,
    pub name: String,
    pub plate_number: String,
    pub capacity: u32,
}

impl From<&Vehicle> for SessionShuttle {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            name: vehicle.name.clone(),
            plate_number: vehicle.plate_number.clone(),
            capacity: vehicle.seat_capacity(),
        }
    }
}

/// Outcome of a shift clustering run used to open a session
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub organization_id: Uuid,
    pub shift_id: Uuid,
    pub location_id: Uuid,
    pub date: Option<NaiveDate>,
    pub hq: Coordinates,
    pub shuttles: Vec<SessionShuttle>,
    pub employees: Vec<PlanningEmployee>,
    pub deferred_employee_ids: Vec<Uuid>,
    pub clusters: HashMap<Uuid, Vec<Uuid>>,
    pub verification_passed: bool,
    pub algorithm: String,
}

/// Parse solver routes keyed by stringified ids back into uuids.
pub fn clusters_from_routes(routes: &[ClusterRoute]) -> HashMap<Uuid, Vec<Uuid>> {
    let mut clusters = HashMap::new();
    for route in routes {
        let Ok(shuttle_id) = Uuid::parse_str(&route.shuttle_id) else {
            tracing::warn!("Ignoring cluster for non-uuid shuttle {}", route.shuttle_id);
            continue;
        };
        let employees = route
            .employees
            .iter()
            .filter_map(|e| Uuid::parse_str(e).ok())
            .collect();
        clusters.insert(shuttle_id, employees);
    }
    clusters
}

#[derive(Debug, Clone)]
pub struct PlanningSession {
    id: Uuid,
    organization_id: Uuid,
    shift_id: Uuid,
    location_id: Uuid,
    date: Option<NaiveDate>,
    hq: Coordinates,
    shuttles: Vec<SessionShuttle>,
    employees: Vec<PlanningEmployee>,
    deferred_employee_ids: Vec<Uuid>,
    recommended: HashMap<Uuid, Vec<Uuid>>,
    original: HashMap<Uuid, Vec<Uuid>>,
    selected_shuttle: Option<Uuid>,
    selected_employees: Vec<Uuid>,
    verification_passed: bool,
    algorithm: String,
    updated_at: DateTime<Utc>,
}

impl PlanningSession {
    pub fn new(seed: SessionSeed) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: seed.organization_id,
            shift_id: seed.shift_id,
            location_id: seed.location_id,
            date: seed.date,
            hq: seed.hq,
            shuttles: seed.shuttles,
            employees: seed.employees,
            deferred_employee_ids: seed.deferred_employee_ids,
            original: seed.clusters.clone(),
            recommended: seed.clusters,
            selected_shuttle: None,
            selected_employees: Vec::new(),
            verification_passed: seed.verification_passed,
            algorithm: seed.algorithm,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn selected_shuttle(&self) -> Option<Uuid> {
        self.selected_shuttle
    }

    pub fn selected_employees(&self) -> &[Uuid] {
        &self.selected_employees
    }

    fn shuttle(&self, id: Uuid) -> Option<&SessionShuttle> {
        self.shuttles.iter().find(|s| s.id == id)
    }

    fn employee(&self, id: Uuid) -> Option<&PlanningEmployee> {
        self.employees.iter().find(|e| e.id == id)
    }

    fn selected(&self) -> Result<&SessionShuttle, SelectionError> {
        self.selected_shuttle
            .and_then(|id| self.shuttle(id))
            .ok_or(SelectionError::ShuttleNotSelected)
    }

    /// Select a shuttle, or unselect it when it is already selected. Either
    /// way the employee selection starts over.
    pub fn select_shuttle(&mut self, shuttle_id: Uuid) -> Result<(), SelectionError> {
        if self.shuttle(shuttle_id).is_none() {
            return Err(SelectionError::UnknownShuttle(shuttle_id));
        }
        self.selected_shuttle = if self.selected_shuttle == Some(shuttle_id) {
            None
        } else {
            Some(shuttle_id)
        };
        self.selected_employees.clear();
        Ok(())
    }

    /// Replace the selection with the selected shuttle's recommended
    /// employees that have stops, up to its capacity.
    pub fn accept_cluster(&mut self) -> Result<(), SelectionError> {
        let shuttle = self.selected()?;
        let capacity = shuttle.capacity as usize;

        let selection: Vec<Uuid> = self
            .recommended
            .get(&shuttle.id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.employee(*id).map_or(false, PlanningEmployee::has_stop))
                    .take(capacity)
                    .collect()
            })
            .unwrap_or_default();

        self.selected_employees = selection;
        Ok(())
    }

    /// Pick or unpick an employee for the selected shuttle. Picking an
    /// employee recommended for another shuttle moves them into this
    /// shuttle's cluster.
    pub fn toggle_employee(&mut self, employee_id: Uuid) -> Result<(), SelectionError> {
        let shuttle = self.selected()?;
        let (shuttle_id, capacity) = (shuttle.id, shuttle.capacity);

        let has_stop = self
            .employee(employee_id)
            .ok_or(SelectionError::UnknownEmployee(employee_id))?
            .has_stop();

        if let Some(pos) = self.selected_employees.iter().position(|id| *id == employee_id) {
            self.selected_employees.remove(pos);
            return Ok(());
        }

        if !has_stop {
            return Err(SelectionError::EmployeeWithoutStop(employee_id));
        }
        if self.selected_employees.len() >= capacity as usize {
            return Err(SelectionError::CapacityExceeded { capacity });
        }

        self.selected_employees.push(employee_id);
        self.move_to_cluster(employee_id, shuttle_id);
        Ok(())
    }

    fn move_to_cluster(&mut self, employee_id: Uuid, shuttle_id: Uuid) {
        for (owner, members) in self.recommended.iter_mut() {
            if *owner != shuttle_id {
                members.retain(|id| *id != employee_id);
            }
        }
        let cluster = self.recommended.entry(shuttle_id).or_default();
        if !cluster.contains(&employee_id) {
            cluster.push(employee_id);
        }
    }

    /// Restore the clusters as computed and drop the employee selection.
    /// The selected shuttle stays selected.
    pub fn clear(&mut self) {
        self.recommended = self.original.clone();
        self.selected_employees.clear();
    }

    fn total_capacity(&self) -> u32 {
        self.shuttles.iter().map(|s| s.capacity).sum()
    }

    fn cluster_of(&self, shuttle_id: Uuid) -> &[Uuid] {
        self.recommended.get(&shuttle_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn snapshot(&self) -> PlanningSnapshot {
        let mut shuttles: Vec<ShuttleView> = self
            .shuttles
            .iter()
            .map(|s| ShuttleView {
                id: s.id,
                name: s.name.clone(),
                plate_number: s.plate_number.clone(),
                capacity: s.capacity,
                recommended: self.cluster_of(s.id).to_vec(),
            })
            .collect();
        shuttles.sort_by(|a, b| b.recommended.len().cmp(&a.recommended.len()));

        let recommended_for: HashMap<Uuid, Uuid> = self
            .recommended
            .iter()
            .flat_map(|(shuttle, members)| members.iter().map(move |e| (*e, *shuttle)))
            .collect();
        let selected_cluster = self.selected_shuttle.map(|s| self.cluster_of(s)).unwrap_or(&[]);

        let mut employees: Vec<EmployeeView> = self
            .employees
            .iter()
            .map(|e| EmployeeView {
                id: e.id,
                name: e.name.clone(),
                department_name: e.department_name.clone(),
                area: e.area_label(),
                stop_id: e.stop_id,
                has_stop: e.has_stop(),
                recommended_shuttle_id: recommended_for.get(&e.id).copied(),
                in_selected_cluster: selected_cluster.contains(&e.id),
                selected: self.selected_employees.contains(&e.id),
            })
            .collect();
        employees.sort_by(|a, b| {
            b.in_selected_cluster
                .cmp(&a.in_selected_cluster)
                .then_with(|| b.selected.cmp(&a.selected))
                .then_with(|| a.name.cmp(&b.name))
        });

        let total_capacity = self.total_capacity();
        let seats_total = self
            .selected_shuttle
            .and_then(|id| self.shuttle(id))
            .map_or(0, |s| s.capacity);

        PlanningSnapshot {
            session_id: self.id,
            shift_id: self.shift_id,
            location_id: self.location_id,
            date: self.date,
            hq: self.hq,
            shuttles,
            employees,
            selected_shuttle_id: self.selected_shuttle,
            selected_employee_ids: self.selected_employees.clone(),
            seats_used: self.selected_employees.len() as u32,
            seats_total,
            total_capacity,
            capacity_exceeded: !self.deferred_employee_ids.is_empty()
                || self.employees.len() as u32 > total_capacity,
            deferred_employee_ids: self.deferred_employee_ids.clone(),
            verification_passed: self.verification_passed,
            algorithm: self.algorithm.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// In-memory session store with inactivity expiry
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, PlanningSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a new session and return its first snapshot.
    pub fn open(&self, session: PlanningSession) -> PlanningSnapshot {
        let snapshot = session.snapshot();
        let mut sessions = self.sessions.lock();
        self.purge_expired(&mut sessions);
        sessions.insert(session.id, session);
        snapshot
    }

    /// Run `f` against a live session of `organization_id`, refreshing its
    /// inactivity timer.
    pub fn update<R>(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
        f: impl FnOnce(&mut PlanningSession) -> Result<R, SelectionError>,
    ) -> Result<R, SelectionError> {
        let mut sessions = self.sessions.lock();
        self.purge_expired(&mut sessions);

        let session = sessions
            .get_mut(&session_id)
            .ok_or(SelectionError::SessionNotFound)?;
        if session.organization_id != organization_id {
            return Err(SelectionError::NotOwner);
        }

        let result = f(session)?;
        session.updated_at = Utc::now();
        Ok(result)
    }

    pub fn snapshot(&self, organization_id: Uuid, session_id: Uuid) -> Result<PlanningSnapshot, SelectionError> {
        self.update(organization_id, session_id, |s| Ok(s.snapshot()))
    }

    /// Discard a session. Missing sessions are reported; sessions of other
    /// organizations are left alone.
    pub fn close(&self, organization_id: Uuid, session_id: Uuid) -> Result<(), SelectionError> {
        let mut sessions = self.sessions.lock();
        match sessions.get(&session_id) {
            None => Err(SelectionError::SessionNotFound),
            Some(s) if s.organization_id != organization_id => Err(SelectionError::NotOwner),
            Some(_) => {
                sessions.remove(&session_id);
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn purge_expired(&self, sessions: &mut HashMap<Uuid, PlanningSession>) {
        let cutoff = Utc::now() - self.ttl;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!("Expired {} planning sessions", purged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::employee::test_employee;

    struct Fixture {
        session: PlanningSession,
        big: Uuid,
        small: Uuid,
        employees: Vec<Uuid>,
    }

    /// Shuttle "big" (3 seats) recommended A, B, C; shuttle "small"
    /// (2 seats) recommended D; E has no stop.
    fn fixture() -> Fixture {
        let names = ["Abebe", "Bethlehem", "Chaltu", "Dawit", "Eden"];
        let mut employees: Vec<PlanningEmployee> = names
            .iter()
            .map(|n| test_employee(n, 9.0, 38.75))
            .collect();
        employees[4].stop_id = None;
        let ids: Vec<Uuid> = employees.iter().map(|e| e.id).collect();

        let small = SessionShuttle {
            id: Uuid::new_v4(),
            name: "Coaster".into(),
            plate_number: "AA-1".into(),
            capacity: 2,
        };
        let big = SessionShuttle {
            id: Uuid::new_v4(),
            name: "Bus".into(),
            plate_number: "AA-2".into(),
            capacity: 3,
        };

        let mut clusters = HashMap::new();
        clusters.insert(big.id, vec![ids[0], ids[1], ids[2]]);
        clusters.insert(small.id, vec![ids[3]]);

        let session = PlanningSession::new(SessionSeed {
            organization_id: Uuid::new_v4(),
            shift_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            date: None,
            hq: Coordinates::new(9.016465390275195, 38.76856893855111),
            shuttles: vec![small.clone(), big.clone()],
            employees,
            deferred_employee_ids: Vec::new(),
            clusters,
            verification_passed: true,
            algorithm: "sweep".into(),
        });

        Fixture {
            session,
            big: big.id,
            small: small.id,
            employees: ids,
        }
    }

    #[test]
    fn test_select_unknown_shuttle() {
        let mut f = fixture();
        let unknown = Uuid::new_v4();
        assert_eq!(
            f.session.select_shuttle(unknown),
            Err(SelectionError::UnknownShuttle(unknown))
        );
    }

    #[test]
    fn test_select_same_shuttle_toggles_off() {
        let mut f = fixture();
        f.session.select_shuttle(f.big).unwrap();
        f.session.accept_cluster().unwrap();
        assert_eq!(f.session.selected_employees().len(), 3);

        f.session.select_shuttle(f.big).unwrap();
        assert_eq!(f.session.selected_shuttle(), None);
        assert!(f.session.selected_employees().is_empty());
    }

    #[test]
    fn test_switching_shuttle_clears_employees() {
        let mut f = fixture();
        f.session.select_shuttle(f.big).unwrap();
        f.session.accept_cluster().unwrap();
        f.session.select_shuttle(f.small).unwrap();
        assert_eq!(f.session.selected_shuttle(), Some(f.small));
        assert!(f.session.selected_employees().is_empty());
    }

    #[test]
    fn test_employees_need_a_shuttle_first() {
        let mut f = fixture();
        assert_eq!(f.session.accept_cluster(), Err(SelectionError::ShuttleNotSelected));
        assert_eq!(
            f.session.toggle_employee(f.employees[0]),
            Err(SelectionError::ShuttleNotSelected)
        );
    }

    #[test]
    fn test_accept_cluster_skips_stopless_and_truncates() {
        let mut f = fixture();
        let e = f.employees.clone();
        f.session.recommended.insert(f.small, vec![e[4], e[3], e[0], e[1]]);

        f.session.select_shuttle(f.small).unwrap();
        f.session.accept_cluster().unwrap();
        assert_eq!(f.session.selected_employees(), &[e[3], e[0]]);
    }

    #[test]
    fn test_toggle_employee_rules() {
        let mut f = fixture();
        let e = f.employees.clone();
        f.session.select_shuttle(f.small).unwrap();

        f.session.toggle_employee(e[0]).unwrap();
        f.session.toggle_employee(e[1]).unwrap();
        assert_eq!(
            f.session.toggle_employee(e[2]),
            Err(SelectionError::CapacityExceeded { capacity: 2 })
        );

        // Unpicking frees a seat
        f.session.toggle_employee(e[0]).unwrap();
        assert_eq!(f.session.selected_employees(), &[e[1]]);

        assert_eq!(
            f.session.toggle_employee(e[4]),
            Err(SelectionError::EmployeeWithoutStop(e[4]))
        );
        let unknown = Uuid::new_v4();
        assert_eq!(
            f.session.toggle_employee(unknown),
            Err(SelectionError::UnknownEmployee(unknown))
        );
    }

    #[test]
    fn test_hand_pick_moves_cluster_and_clear_restores() {
        let mut f = fixture();
        let e = f.employees.clone();
        f.session.select_shuttle(f.small).unwrap();
        f.session.toggle_employee(e[0]).unwrap();

        assert_eq!(f.session.cluster_of(f.small), &[e[3], e[0]]);
        assert_eq!(f.session.cluster_of(f.big), &[e[1], e[2]]);

        f.session.clear();
        assert_eq!(f.session.selected_shuttle(), Some(f.small));
        assert!(f.session.selected_employees().is_empty());
        assert_eq!(f.session.cluster_of(f.big), &[e[0], e[1], e[2]]);
        assert_eq!(f.session.cluster_of(f.small), &[e[3]]);
    }

    #[test]
    fn test_snapshot_ordering() {
        let mut f = fixture();
        let e = f.employees.clone();
        f.session.select_shuttle(f.small).unwrap();
        f.session.toggle_employee(e[2]).unwrap();

        let snapshot = f.session.snapshot();

        // Big cluster (A, B) and small cluster (D, C) tie; original order kept
        assert_eq!(snapshot.shuttles[0].id, f.small);
        assert_eq!(snapshot.seats_used, 1);
        assert_eq!(snapshot.seats_total, 2);
        assert_eq!(snapshot.total_capacity, 5);
        assert!(!snapshot.capacity_exceeded);

        let order: Vec<&str> = snapshot.employees.iter().map(|v| v.name.as_str()).collect();
        // Selected cluster (Chaltu, Dawit), then others by name
        assert_eq!(order, vec!["Chaltu", "Dawit", "Abebe", "Bethlehem", "Eden"]);
        assert!(snapshot.employees[0].selected);
        assert_eq!(snapshot.employees[2].recommended_shuttle_id, Some(f.big));
        assert!(!snapshot.employees[4].has_stop);
    }

    #[test]
    fn test_snapshot_shuttles_by_cluster_size() {
        let f = fixture();
        let snapshot = f.session.snapshot();
        assert_eq!(snapshot.shuttles[0].id, f.big);
        assert_eq!(snapshot.shuttles[1].id, f.small);
        assert_eq!(snapshot.seats_total, 0);
    }

    #[test]
    fn test_clusters_from_routes_skips_bad_ids() {
        let shuttle = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let routes = vec![
            ClusterRoute {
                shuttle_id: shuttle.to_string(),
                employees: vec![employee.to_string(), "nope".into()],
            },
            ClusterRoute {
                shuttle_id: "bad".into(),
                employees: vec![],
            },
        ];
        let clusters = clusters_from_routes(&routes);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[&shuttle], vec![employee]);
    }

    #[test]
    fn test_store_ownership_and_close() {
        let store = SessionStore::new(Duration::minutes(5));
        let f = fixture();
        let org = f.session.organization_id();
        let snapshot = store.open(f.session);

        assert!(store.snapshot(org, snapshot.session_id).is_ok());
        assert_eq!(
            store.snapshot(Uuid::new_v4(), snapshot.session_id).unwrap_err(),
            SelectionError::NotOwner
        );

        store
            .update(org, snapshot.session_id, |s| s.select_shuttle(f.big))
            .unwrap();
        let after = store.snapshot(org, snapshot.session_id).unwrap();
        assert_eq!(after.selected_shuttle_id, Some(f.big));

        store.close(org, snapshot.session_id).unwrap();
        assert_eq!(
            store.close(org, snapshot.session_id),
            Err(SelectionError::SessionNotFound)
        );
    }

    #[test]
    fn test_store_expires_idle_sessions() {
        let store = SessionStore::new(Duration::zero());
        let mut f = fixture();
        let org = f.session.organization_id();
        f.session.updated_at = Utc::now() - Duration::seconds(1);
        let id = f.session.id();
        store.sessions.lock().insert(id, f.session);

        assert_eq!(store.snapshot(org, id).unwrap_err(), SelectionError::SessionNotFound);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SelectionError::ShuttleNotSelected.code(), "SHUTTLE_NOT_SELECTED");
        assert_eq!(
            SelectionError::CapacityExceeded { capacity: 4 }.code(),
            "CAPACITY_EXCEEDED"
        );
        assert_eq!(SelectionError::NotOwner.code(), "NOT_OWNER");
    }
}
