use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Work shift. Shuttles leave HQ when the shift ends.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub time_zone: String,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    /// Moment a route for this shift departs on `date`.
    pub fn departure_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.end_time)
    }

    /// Shift end as "5PM" style label, minutes dropped.
    #[cfg(test)]
    pub fn end_label(&self) -> String {
        hour_label(self.end_time)
    }
}

pub fn hour_label(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!("{}{}", hour, if pm { "PM" } else { "AM" })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftListResponse {
    pub items: Vec<Shift>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(end: NaiveTime) -> Shift {
        Shift {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            name: "Day".into(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: end,
            time_zone: "Africa/Addis_Ababa".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_end_label_afternoon() {
        let s = shift(NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert_eq!(s.end_label(), "5PM");
    }

    #[test]
    fn test_end_label_midnight_and_noon() {
        assert_eq!(hour_label(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), "12AM");
        assert_eq!(hour_label(NaiveTime::from_hms_opt(12, 15, 0).unwrap()), "12PM");
        assert_eq!(hour_label(NaiveTime::from_hms_opt(6, 0, 0).unwrap()), "6AM");
    }

    #[test]
    fn test_departure_on_date() {
        let s = shift(NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(s.departure_on(date).to_string(), "2026-03-02 17:00:00");
    }
}
