//! Department-level admission when employees outnumber seats.

use std::collections::HashMap;

use uuid::Uuid;

use crate::types::PlanningEmployee;

#[derive(Debug, Clone, Default)]
pub struct Admission {
    pub admitted: Vec<PlanningEmployee>,
    pub deferred: Vec<PlanningEmployee>,
    pub capacity_exceeded: bool,
}

/// Keep whole departments together: when `employees` exceed
/// `total_capacity`, departments are taken largest first (ties by name)
/// while they fit; a department that does not fit is deferred entirely and
/// smaller ones are still tried.
pub fn admit_by_department(employees: Vec<PlanningEmployee>, total_capacity: u32) -> Admission {
    let total_capacity = total_capacity as usize;
    if employees.len() <= total_capacity {
        return Admission {
            admitted: employees,
            deferred: Vec::new(),
            capacity_exceeded: false,
        };
    }

    let mut groups: HashMap<Option<Uuid>, Vec<PlanningEmployee>> = HashMap::new();
    for employee in employees {
        groups.entry(employee.department_id).or_default().push(employee);
    }

    let mut groups: Vec<(String, Vec<PlanningEmployee>)> = groups
        .into_values()
        .map(|members| {
            let name = members
                .first()
                .and_then(|e| e.department_name.clone())
                .unwrap_or_default();
            (name, members)
        })
        .collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

    let mut admission = Admission {
        capacity_exceeded: true,
        ..Default::default()
    };
    for (_, members) in groups {
        if admission.admitted.len() + members.len() <= total_capacity {
            admission.admitted.extend(members);
        } else {
            admission.deferred.extend(members);
        }
    }

    admission
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::employee::test_employee;

    fn in_department(name: &str, dept: Uuid, dept_name: &str) -> PlanningEmployee {
        let mut e = test_employee(name, 9.0, 38.7);
        e.department_id = Some(dept);
        e.department_name = Some(dept_name.to_string());
        e
    }

    #[test]
    fn test_everyone_fits() {
        let employees = vec![test_employee("A", 9.0, 38.7), test_employee("B", 9.0, 38.7)];
        let admission = admit_by_department(employees, 2);
        assert_eq!(admission.admitted.len(), 2);
        assert!(!admission.capacity_exceeded);
    }

    #[test]
    fn test_keeps_departments_whole() {
        let finance = Uuid::new_v4();
        let ops = Uuid::new_v4();
        let hr = Uuid::new_v4();
        let employees = vec![
            in_department("F1", finance, "Finance"),
            in_department("F2", finance, "Finance"),
            in_department("F3", finance, "Finance"),
            in_department("O1", ops, "Operations"),
            in_department("O2", ops, "Operations"),
            in_department("H1", hr, "HR"),
        ];

        let admission = admit_by_department(employees, 4);

        assert!(admission.capacity_exceeded);
        // Finance (3) first, Operations (2) no longer fits, HR (1) does
        let admitted: Vec<&str> = admission.admitted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(admitted, vec!["F1", "F2", "F3", "H1"]);
        assert_eq!(admission.deferred.len(), 2);
    }

    #[test]
    fn test_equal_sized_departments_ordered_by_name() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let employees = vec![
            in_department("Z1", b, "Zoning"),
            in_department("Z2", b, "Zoning"),
            in_department("A1", a, "Audit"),
            in_department("A2", a, "Audit"),
        ];

        let admission = admit_by_department(employees, 3);
        let admitted: Vec<&str> = admission.admitted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(admitted, vec!["A1", "A2"]);
    }

    #[test]
    fn test_zero_capacity_defers_everyone() {
        let admission = admit_by_department(vec![test_employee("A", 9.0, 38.7)], 0);
        assert!(admission.admitted.is_empty());
        assert_eq!(admission.deferred.len(), 1);
    }
}
