//! Appointment record types

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// National ID categories accepted by the clinic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    /// Cédula de ciudadanía
    Cc,
    /// Tarjeta de identidad
    Ti,
    /// Cédula de extranjería
    Ce,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [DocumentType::Cc, DocumentType::Ti, DocumentType::Ce];

    /// Parse a normalized (lower-case) code
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "cc" => Some(Self::Cc),
            "ti" => Some(Self::Ti),
            "ce" => Some(Self::Ce),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cc => "CC",
            Self::Ti => "TI",
            Self::Ce => "CE",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance answer stored in `confirmacionCita`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    Si,
    No,
}

impl Confirmation {
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "si" => Some(Self::Si),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Si => "si",
            Self::No => "no",
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an appointment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "tipoDocumento")]
    pub document_type: String,
    #[serde(rename = "documento")]
    pub document_number: String,
    #[serde(rename = "nombrePaciente")]
    pub patient_name: String,
    #[serde(rename = "especialidad")]
    pub specialty: String,
    #[serde(rename = "nombreMedico")]
    pub physician_name: String,
    /// `YYYY-MM-DD`
    #[serde(rename = "fechaCita")]
    pub date: String,
    #[serde(rename = "telefonoPaciente")]
    pub patient_phone: String,
    #[serde(
        rename = "confirmacionCita",
        default,
        deserialize_with = "lenient_confirmation"
    )]
    pub confirmation: Option<Confirmation>,
}

impl Appointment {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    /// Scheduled today or later. Rows with an unreadable date are not upcoming.
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.parsed_date().is_some_and(|d| d >= today)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Some(Confirmation::Si)
    }

    pub fn is_pending(&self) -> bool {
        self.confirmation.is_none()
    }

    pub fn key(&self) -> AppointmentKey {
        match self.id {
            Some(id) => AppointmentKey::Id(id),
            None => AppointmentKey::Document {
                document_type: self.document_type.clone(),
                document_number: self.document_number.clone(),
                date: self.date.clone(),
            },
        }
    }
}

/// Identifies one appointment row for an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentKey {
    Id(i64),
    Document {
        document_type: String,
        document_number: String,
        date: String,
    },
}

/// Unknown or empty confirmation values read as unset.
fn lenient_confirmation<'de, D>(deserializer: D) -> Result<Option<Confirmation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Confirmation::parse(s.trim().to_ascii_lowercase().as_str())))
}
