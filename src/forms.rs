//! Free-text input as typed by a user, checked before anything is sent.

use chrono_tz::Tz;

use crate::error::ApiError;
use crate::models::{
    AttendanceRequest, DonationRequest, Materials, NewCollectionEvent, NewWorkshopEvent, Pillar,
};
use crate::schedule;

/// Fields shared by both event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventDetails {
    pub date: String,
    pub start: String,
    pub end: String,
    pub latitude: String,
    pub longitude: String,
    pub limit: String,
}

struct CheckedDetails {
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: chrono::DateTime<chrono::Utc>,
    latitude: f64,
    longitude: f64,
    capacity_limit: u32,
}

impl EventDetails {
    fn check(&self, tz: Tz) -> Result<CheckedDetails, ApiError> {
        for (name, value) in [
            ("date", &self.date),
            ("start time", &self.start),
            ("end time", &self.end),
            ("latitude", &self.latitude),
            ("longitude", &self.longitude),
            ("participant limit", &self.limit),
        ] {
            require(name, value)?;
        }

        let capacity_limit: u32 = self.limit.trim().parse().map_err(|_| {
            ApiError::validation(format!("participant limit {:?} is not a whole number", self.limit.trim()))
        })?;
        if capacity_limit == 0 {
            return Err(ApiError::validation("participant limit must be at least 1"));
        }

        let latitude = parse_coordinate("latitude", &self.latitude, 90.0)?;
        let longitude = parse_coordinate("longitude", &self.longitude, 180.0)?;
        let (start_time, end_time) = schedule::event_window(&self.date, &self.start, &self.end, tz)?;

        Ok(CheckedDetails {
            start_time,
            end_time,
            latitude,
            longitude,
            capacity_limit,
        })
    }
}

fn require(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{name} is required")));
    }
    Ok(())
}

fn parse_coordinate(name: &str, raw: &str, bound: f64) -> Result<f64, ApiError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("{name} {:?} is not a number", raw.trim())))?;
    if !value.is_finite() || value.abs() > bound {
        return Err(ApiError::validation(format!(
            "{name} must be between -{bound} and {bound}"
        )));
    }
    Ok(value)
}

/// Build a collection event for `organizer_id` from form input.
pub fn collection_event(
    organizer_id: &str,
    details: &EventDetails,
    tz: Tz,
) -> Result<NewCollectionEvent, ApiError> {
    require("organizer id", organizer_id)?;
    let checked = details.check(tz)?;
    Ok(NewCollectionEvent {
        organizer_id: organizer_id.trim().to_string(),
        start_time: checked.start_time,
        end_time: checked.end_time,
        longitude: checked.longitude,
        latitude: checked.latitude,
        capacity_limit: checked.capacity_limit,
    })
}

pub fn workshop_event(
    organizer_id: &str,
    title: &str,
    pillar: &str,
    details: &EventDetails,
    tz: Tz,
) -> Result<NewWorkshopEvent, ApiError> {
    require("organizer id", organizer_id)?;
    require("title", title)?;
    require("pillar", pillar)?;
    let pillar: Pillar = pillar.parse().map_err(ApiError::Validation)?;
    let checked = details.check(tz)?;
    Ok(NewWorkshopEvent {
        organizer_id: organizer_id.trim().to_string(),
        title: title.trim().to_string(),
        pillar,
        start_time: checked.start_time,
        end_time: checked.end_time,
        longitude: checked.longitude,
        latitude: checked.latitude,
        capacity_limit: checked.capacity_limit,
    })
}

/// Kilograms per material as typed. Blank means none.
#[derive(Debug, Clone, Default)]
pub struct DonationForm {
    pub paper: String,
    pub cardboard: String,
    pub metal: String,
    pub plastic: String,
    pub glass: String,
    pub tetrapack: String,
}

fn parse_kg(name: &str, raw: &str) -> Result<u32, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| {
        ApiError::validation(format!("{name} {raw:?} must be a whole, non-negative number of kilograms"))
    })
}

impl DonationForm {
    pub fn materials(&self) -> Result<Materials, ApiError> {
        let materials = Materials {
            paper: parse_kg("paper", &self.paper)?,
            cardboard: parse_kg("cardboard", &self.cardboard)?,
            metal: parse_kg("metal", &self.metal)?,
            plastic: parse_kg("plastic", &self.plastic)?,
            glass: parse_kg("glass", &self.glass)?,
            tetrapack: parse_kg("tetrapack", &self.tetrapack)?,
        };
        if materials.total_kg() == 0 {
            return Err(ApiError::validation("a donation needs at least one kilogram"));
        }
        Ok(materials)
    }
}

pub fn donation(contributor_id: &str, form: &DonationForm) -> Result<DonationRequest, ApiError> {
    require("contributor id", contributor_id)?;
    Ok(DonationRequest {
        contributor_id: contributor_id.trim().to_string(),
        materials: form.materials()?,
    })
}

pub fn attendance(contributor_id: &str) -> Result<AttendanceRequest, ApiError> {
    require("contributor id", contributor_id)?;
    Ok(AttendanceRequest {
        contributor_id: contributor_id.trim().to_string(),
    })
}
