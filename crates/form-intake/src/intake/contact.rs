use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::Record;
use super::normalizer::mint_id;

pub const CONTACT_SOURCE: &str = "website_registration";

/// CRM contact row derived from a candidate registration. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateContact {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub contact_type: String,
    pub status: String,
    pub temperature: String,
    pub company: String,
    pub position: String,
    pub location: String,
    pub postcode: String,
    pub skills: String,
    pub experience_level: String,
    pub hourly_rate: Option<f64>,
    pub availability: String,
    pub right_to_work: String,
    pub travel_method: String,
    pub contract_preference: String,
    pub shift_availability: String,
    pub notes: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateContact {
    /// Map a registration onto the contact schema. The contact id is minted fresh;
    /// candidate identity is independent of the registration that produced it.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Self {
        let text = |key: &str| record.text(key).unwrap_or_default();
        let postcode = text("postcode");
        let (hourly_rate, stated_rate) = hourly_rate(record);

        let mut notes = format!(
            "Website registration completed on {}. Original registration ID: {}",
            now.format("%d/%m/%Y"),
            record.id
        );
        // The column is numeric; free-text rates are kept verbatim in the notes.
        if let Some(stated) = stated_rate {
            notes.push_str(&format!(". Stated hourly rate: {stated}"));
        }

        Self {
            id: mint_id("CAND", now),
            name: format!("{} {}", text("firstName"), text("lastName")),
            email: record.text("email"),
            phone: record.text("phone"),
            contact_type: "candidate".to_string(),
            status: "active".to_string(),
            temperature: "warm".to_string(),
            company: text("company"),
            position: text("position"),
            location: format!("{}, {}", text("address"), postcode),
            postcode,
            skills: text("skills"),
            experience_level: text("experienceLevel"),
            hourly_rate,
            availability: text("availability"),
            right_to_work: text("rightToWork"),
            travel_method: text("travelMethod"),
            contract_preference: text("contractPreference"),
            shift_availability: text("shiftAvailability"),
            notes,
            source: CONTACT_SOURCE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Numeric rate when the caller's value reads as one, otherwise the raw text.
fn hourly_rate(record: &Record) -> (Option<f64>, Option<String>) {
    let Some(value) = record.field("hourlyRate") else {
        return (None, None);
    };
    match rate_value(value) {
        Some(rate) => (Some(rate), None),
        None => (
            None,
            record
                .text("hourlyRate")
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty()),
        ),
    }
}

fn rate_value(value: &Value) -> Option<f64> {
    let rate = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().trim_start_matches('£').trim().parse().ok(),
        _ => None,
    }?;
    rate.is_finite().then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::domain::SubmissionKind;
    use crate::intake::normalizer::normalize;
    use serde_json::json;

    #[test]
    fn maps_sparse_registration_with_defaults() {
        let record = normalize(
            SubmissionKind::Registration,
            json!({ "firstName": "Jane", "lastName": "Doe", "postcode": "E1" }),
        );
        let contact = CandidateContact::from_record(&record, Utc::now());

        assert_eq!(contact.name, "Jane Doe");
        assert_eq!(contact.location, ", E1");
        assert_eq!(contact.postcode, "E1");
        assert_eq!(contact.skills, "");
        assert_eq!(contact.email, None);
        assert_eq!(contact.hourly_rate, None);
        assert_eq!(contact.contact_type, "candidate");
        assert_eq!(contact.temperature, "warm");
    }

    #[test]
    fn contact_identity_is_independent_of_registration() {
        let record = normalize(SubmissionKind::Registration, json!({}));
        let now = Utc::now();
        let first = CandidateContact::from_record(&record, now);
        let second = CandidateContact::from_record(&record, now);

        assert!(first.id.starts_with("CAND_"));
        assert_ne!(first.id, record.id.0);
        assert_ne!(first.id, second.id);
        assert!(first.notes.contains(record.id.as_str()));
    }

    #[test]
    fn renames_camel_case_fields_and_parses_rates() {
        let record = normalize(
            SubmissionKind::Registration,
            json!({
                "firstName": "Sam",
                "lastName": "Okafor",
                "email": "sam@example.com",
                "phone": 7700900123u64,
                "address": "1 High St",
                "postcode": "M1 1AA",
                "experienceLevel": "senior",
                "hourlyRate": "£14.50",
                "rightToWork": "yes",
                "travelMethod": "car",
                "contractPreference": "temp",
                "shiftAvailability": "nights",
            }),
        );
        let contact = CandidateContact::from_record(&record, Utc::now());

        assert_eq!(contact.location, "1 High St, M1 1AA");
        assert_eq!(contact.phone.as_deref(), Some("7700900123"));
        assert_eq!(contact.experience_level, "senior");
        assert_eq!(contact.hourly_rate, Some(14.5));
        assert_eq!(contact.right_to_work, "yes");
        assert_eq!(contact.travel_method, "car");
        assert_eq!(contact.contract_preference, "temp");
        assert_eq!(contact.shift_availability, "nights");
        assert!(!contact.notes.contains("Stated hourly rate"));
    }

    #[test]
    fn free_text_rates_are_kept_in_notes() {
        for (stated, parsed) in [
            ("£12-15", None),
            ("12.50 per hour", None),
            ("14/hr", None),
            ("£ 14", Some(14.0)),
        ] {
            let record = normalize(
                SubmissionKind::Registration,
                json!({ "firstName": "Lee", "hourlyRate": stated }),
            );
            let contact = CandidateContact::from_record(&record, Utc::now());

            assert_eq!(contact.hourly_rate, parsed, "{stated}");
            if parsed.is_none() {
                assert!(
                    contact
                        .notes
                        .ends_with(&format!(". Stated hourly rate: {stated}")),
                    "{stated} missing from notes: {}",
                    contact.notes
                );
            }
        }
    }
}
