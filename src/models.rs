use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamps travel as RFC 3339 in UTC with a `Z` suffix. Sub-second
/// precision is written only when present; reads accept any offset.
pub mod wire_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    #[serde(rename = "CollaboratorID", default)]
    pub collaborator_id: String,
    #[serde(rename = "FBID")]
    pub federated_id: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Email")]
    pub email: String,
}

/// `GET /api/collaborator/{id}` wraps the record.
#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub collaborator: User,
}

/// Kilograms per material kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Materials {
    #[serde(rename = "Paper", default)]
    pub paper: u32,
    #[serde(rename = "Cardboard", default)]
    pub cardboard: u32,
    #[serde(rename = "Metal", default)]
    pub metal: u32,
    #[serde(rename = "Plastic", default)]
    pub plastic: u32,
    #[serde(rename = "Glass", default)]
    pub glass: u32,
    #[serde(rename = "Tetrapack", default)]
    pub tetrapack: u32,
}

impl Materials {
    pub fn total_kg(&self) -> u64 {
        [
            self.paper,
            self.cardboard,
            self.metal,
            self.plastic,
            self.glass,
            self.tetrapack,
        ]
        .iter()
        .map(|&kg| u64::from(kg))
        .sum()
    }

    /// (label, kilograms) pairs in display order.
    pub fn breakdown(&self) -> [(&'static str, u32); 6] {
        [
            ("Cardboard", self.cardboard),
            ("Glass", self.glass),
            ("Plastic", self.plastic),
            ("Tetrapack", self.tetrapack),
            ("Paper", self.paper),
            ("Metal", self.metal),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Donation {
    #[serde(rename = "UserFBID")]
    pub contributor_id: String,
    #[serde(rename = "Username", default)]
    pub contributor_name: String,
    #[serde(flatten)]
    pub materials: Materials,
}

impl Donation {
    pub fn total_kg(&self) -> u64 {
        self.materials.total_kg()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CollectionEvent {
    #[serde(rename = "RecollectID")]
    pub id: String,
    #[serde(rename = "CollaboratorFBID")]
    pub organizer_id: String,
    #[serde(rename = "StartTime", with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "EndTime", with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Limit", default, deserialize_with = "null_as_default")]
    pub capacity_limit: i64,
    #[serde(rename = "DonationArray", default, deserialize_with = "null_as_default")]
    pub donations: Vec<Donation>,
}

impl CollectionEvent {
    pub fn total_kg(&self) -> u64 {
        self.donations.iter().map(Donation::total_kg).sum()
    }
}

/// Body of `POST /api/recollect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCollectionEvent {
    #[serde(rename = "CollaboratorFBID")]
    pub organizer_id: String,
    #[serde(rename = "StartTime", with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "EndTime", with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Limit")]
    pub capacity_limit: u32,
}

/// Workshop category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pillar {
    Transporte,
    Energia,
    Consumo,
    Desecho,
}

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::Transporte,
        Pillar::Energia,
        Pillar::Consumo,
        Pillar::Desecho,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Pillar::Transporte => "TRANSPORTE",
            Pillar::Energia => "ENERGIA",
            Pillar::Consumo => "CONSUMO",
            Pillar::Desecho => "DESECHO",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pillar::Transporte => "Transport",
            Pillar::Energia => "Energy",
            Pillar::Consumo => "Consumption",
            Pillar::Desecho => "Waste",
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Pillar {
    type Err = String;

    /// Case-insensitive; accepts the wire names and the English labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Pillar::ALL
            .into_iter()
            .find(|p| p.wire_name().eq_ignore_ascii_case(wanted) || p.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "unknown pillar {wanted:?}, expected one of transport, energy, consumption, waste"
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Assistant {
    #[serde(rename = "UserFBID")]
    pub contributor_id: String,
    #[serde(rename = "Username", default)]
    pub contributor_name: String,
    #[serde(rename = "Email", default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkshopEvent {
    #[serde(rename = "CourseID")]
    pub id: String,
    #[serde(rename = "CollaboratorFBID")]
    pub organizer_id: String,
    #[serde(rename = "Title", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "Pillar")]
    pub pillar: Pillar,
    #[serde(rename = "StartTime", with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "EndTime", with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Limit", default, deserialize_with = "null_as_default")]
    pub capacity_limit: i64,
    #[serde(rename = "AssistantArray", default, deserialize_with = "null_as_default")]
    pub assistants: Vec<Assistant>,
}

/// Body of `POST /api/course`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWorkshopEvent {
    #[serde(rename = "CollaboratorFBID")]
    pub organizer_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Pillar")]
    pub pillar: Pillar,
    #[serde(rename = "StartTime", with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "EndTime", with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Limit")]
    pub capacity_limit: u32,
}

/// Body of `PATCH /api/recollect/add_to_recollect/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationRequest {
    #[serde(rename = "UserFBID")]
    pub contributor_id: String,
    #[serde(flatten)]
    pub materials: Materials,
}

/// Body of `PATCH /api/course/add_assistant/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRequest {
    #[serde(rename = "UserFBID")]
    pub contributor_id: String,
}
