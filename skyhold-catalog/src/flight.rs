use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use skyhold_core::{CoreError, CoreResult};
use uuid::Uuid;

/// A scheduled flight. Direct flights carry an aircraft; multi-leg flights
/// leave `aircraft_id` empty and get their aircraft from each leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    /// Unique flight code, e.g. "AR1302".
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub aircraft_id: Option<Uuid>,
    pub distance_km: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Flight {
    pub fn new(
        code: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
        aircraft_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            origin: origin.into(),
            destination: destination.into(),
            departure_at,
            arrival_at,
            aircraft_id,
            distance_km: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departure_at <= now
    }

    pub fn time_to_departure(&self, now: DateTime<Utc>) -> Duration {
        self.departure_at - now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightLeg {
    pub id: Uuid,
    pub flight_id: Uuid,
    /// 1-based position within the flight.
    pub leg_order: i32,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub aircraft_id: Uuid,
    pub distance_km: Option<i32>,
    pub active: bool,
}

impl FlightLeg {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flight_id: Uuid,
        leg_order: i32,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
        aircraft_id: Uuid,
        distance_km: Option<i32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            flight_id,
            leg_order,
            origin: origin.into(),
            destination: destination.into(),
            departure_at,
            arrival_at,
            aircraft_id,
            distance_km,
            active: true,
        }
    }
}

/// A flight together with its active legs, ordered by `leg_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightItinerary {
    pub flight: Flight,
    pub legs: Vec<FlightLeg>,
}

impl FlightItinerary {
    pub fn direct(flight: Flight) -> Self {
        Self {
            flight,
            legs: Vec::new(),
        }
    }

    pub fn with_legs(flight: Flight, mut legs: Vec<FlightLeg>) -> Self {
        legs.retain(|l| l.active);
        legs.sort_by_key(|l| l.leg_order);
        Self { flight, legs }
    }

    /// Derived from the presence of active legs, never stored.
    pub fn has_legs(&self) -> bool {
        !self.legs.is_empty()
    }

    pub fn leg(&self, leg_id: Uuid) -> Option<&FlightLeg> {
        self.legs.iter().find(|l| l.id == leg_id)
    }

    /// The aircraft a seat offer must be drawn from.
    pub fn aircraft_for(&self, leg_id: Option<Uuid>) -> CoreResult<Uuid> {
        match leg_id {
            Some(id) => self.leg(id).map(|l| l.aircraft_id).ok_or_else(|| {
                CoreError::Validation(format!("leg {} does not belong to flight {}", id, self.flight.code))
            }),
            None => self.flight.aircraft_id.ok_or_else(|| {
                CoreError::Validation(format!(
                    "flight {} has no aircraft assigned; configure seats per leg",
                    self.flight.code
                ))
            }),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let f = &self.flight;
        if f.arrival_at <= f.departure_at {
            return Err(CoreError::Validation(format!("flight {} arrives before it departs", f.code)));
        }
        if !self.has_legs() {
            if f.aircraft_id.is_none() {
                return Err(CoreError::Validation(format!(
                    "flight {} needs an aircraft or at least one leg",
                    f.code
                )));
            }
            return Ok(());
        }

        for (idx, leg) in self.legs.iter().enumerate() {
            if leg.flight_id != f.id {
                return Err(CoreError::Validation(format!("leg {} belongs to another flight", leg.id)));
            }
            if leg.leg_order != idx as i32 + 1 {
                return Err(CoreError::Validation(format!(
                    "legs of flight {} must be numbered 1..{} without gaps",
                    f.code,
                    self.legs.len()
                )));
            }
            if leg.arrival_at <= leg.departure_at {
                return Err(CoreError::Validation(format!("leg {} arrives before it departs", leg.leg_order)));
            }
            if idx > 0 {
                let prev = &self.legs[idx - 1];
                if leg.departure_at < prev.arrival_at {
                    return Err(CoreError::Validation(format!(
                        "leg {} departs before leg {} arrives",
                        leg.leg_order, prev.leg_order
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        if self.has_legs() {
            self.legs.iter().map(|l| l.arrival_at - l.departure_at).sum()
        } else {
            self.flight.arrival_at - self.flight.departure_at
        }
    }

    pub fn total_distance_km(&self) -> Option<i32> {
        if self.has_legs() {
            self.legs.iter().map(|l| l.distance_km).sum()
        } else {
            self.flight.distance_km
        }
    }
}
