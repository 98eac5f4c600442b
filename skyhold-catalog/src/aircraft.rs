use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyhold_core::{CoreError, CoreResult};
use uuid::Uuid;

const COLUMN_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AircraftStatus {
    Operational,
    Maintenance,
    Retired,
}

impl AircraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AircraftStatus::Operational => "OPERATIONAL",
            AircraftStatus::Maintenance => "MAINTENANCE",
            AircraftStatus::Retired => "RETIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPERATIONAL" => Some(AircraftStatus::Operational),
            "MAINTENANCE" => Some(AircraftStatus::Maintenance),
            "RETIRED" => Some(AircraftStatus::Retired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aircraft {
    pub id: Uuid,
    /// Tail number, unique across the fleet.
    pub registration: String,
    pub model: String,
    pub rows: u16,
    pub columns: u8,
    pub status: AircraftStatus,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Aircraft {
    pub fn new(registration: impl Into<String>, model: impl Into<String>, rows: u16, columns: u8) -> CoreResult<Self> {
        if rows == 0 {
            return Err(CoreError::Validation("aircraft needs at least one row".to_string()));
        }
        if columns == 0 || columns as usize > COLUMN_LETTERS.len() {
            return Err(CoreError::Validation(format!(
                "aircraft columns must be between 1 and {}",
                COLUMN_LETTERS.len()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            registration: registration.into(),
            model: model.into(),
            rows,
            columns,
            status: AircraftStatus::Operational,
            active: true,
            created_at: Utc::now(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Row-major seat grid: 1A, 1B, ... 2A, ... Called once when the
    /// aircraft is registered; the result is persisted and never rebuilt.
    pub fn generate_seats(&self) -> Vec<PhysicalSeat> {
        let mut seats = Vec::with_capacity(self.capacity());
        for row in 1..=self.rows {
            for col in 0..self.columns {
                seats.push(PhysicalSeat::new(self.id, row, COLUMN_LETTERS[col as usize] as char));
            }
        }
        seats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhysicalSeat {
    pub id: Uuid,
    pub aircraft_id: Uuid,
    pub row: u16,
    pub column: char,
    pub active: bool,
}

impl PhysicalSeat {
    pub fn new(aircraft_id: Uuid, row: u16, column: char) -> Self {
        Self {
            id: Uuid::new_v4(),
            aircraft_id,
            row,
            column,
            active: true,
        }
    }

    /// "12A"
    pub fn number(&self) -> String {
        format!("{}{}", self.row, self.column)
    }
}

/// Splits "12A" into (12, 'A') so seat lists sort by row, then column.
pub fn seat_sort_key(number: &str) -> (u16, String) {
    let split = number
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(number.len());
    let row = number[..split].parse().unwrap_or(u16::MAX);
    (row, number[split..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_generation_is_row_major() {
        let aircraft = Aircraft::new("LV-ABC", "A320", 3, 4).unwrap();
        let seats = aircraft.generate_seats();

        assert_eq!(seats.len(), 12);
        assert_eq!(seats[0].number(), "1A");
        assert_eq!(seats[3].number(), "1D");
        assert_eq!(seats[4].number(), "2A");
        assert_eq!(seats[11].number(), "3D");
        assert!(seats.iter().all(|s| s.aircraft_id == aircraft.id));
    }

    #[test]
    fn test_seat_numbers_are_unique_per_aircraft() {
        let aircraft = Aircraft::new("LV-XYZ", "B737", 30, 6).unwrap();
        let mut numbers: Vec<String> = aircraft.generate_seats().iter().map(|s| s.number()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 180);
    }

    #[test]
    fn test_invalid_grid() {
        assert!(Aircraft::new("LV-0", "X", 0, 4).is_err());
        assert!(Aircraft::new("LV-0", "X", 10, 27).is_err());
    }

    #[test]
    fn test_seat_sort_key() {
        let mut numbers = vec!["10A", "2B", "2A", "1C"];
        numbers.sort_by_key(|n| seat_sort_key(n));
        assert_eq!(numbers, vec!["1C", "2A", "2B", "10A"]);
    }
}
