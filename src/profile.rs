//! User profile record
//!
//! Every field is optional; an absent field means "unspecified". The record
//! is replaced wholesale at the profile endpoint, and `validate` is the
//! single boundary where submitted values are checked.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    MuscleGain,
    Maintenance,
    GeneralHealth,
}

/// Demographic and preference attributes used to personalize responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight_kg: Option<f64>,
}

/// Rejected profile submission with per-field messages
#[derive(Debug, Error, PartialEq)]
#[error("invalid profile: {}", issues.join("; "))]
pub struct ProfileValidationError {
    pub issues: Vec<String>,
}

impl UserProfile {
    /// Validate a submitted profile. Absent fields are always acceptable.
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        let mut issues = Vec::new();

        if let Some(age) = self.age {
            if !(1..=120).contains(&age) {
                issues.push(format!("age must be between 1 and 120, got {age}"));
            }
        }
        if let Some(height) = self.height_cm {
            if !(50.0..=280.0).contains(&height) {
                issues.push(format!("height_cm must be between 50 and 280, got {height}"));
            }
        }
        if let Some(weight) = self.weight_kg {
            if !(20.0..=500.0).contains(&weight) {
                issues.push(format!("weight_kg must be between 20 and 500, got {weight}"));
            }
        }
        if let Some(target) = self.target_weight_kg {
            if !(20.0..=500.0).contains(&target) {
                issues.push(format!(
                    "target_weight_kg must be between 20 and 500, got {target}"
                ));
            }
        }
        if self.allergies.iter().any(|a| a.trim().is_empty()) {
            issues.push("allergies must not contain blank entries".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ProfileValidationError { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_is_valid() {
        assert!(UserProfile::default().validate().is_ok());
    }

    #[test]
    fn full_profile_is_valid() {
        let profile = UserProfile {
            age: Some(34),
            sex: Some(Sex::Female),
            height_cm: Some(168.0),
            weight_kg: Some(62.5),
            activity_level: Some(ActivityLevel::Moderate),
            dietary_preference: Some("vegetarian".to_string()),
            allergies: vec!["peanuts".to_string(), "shellfish".to_string()],
            cuisine_preference: Some("mediterranean".to_string()),
            goal: Some(Goal::Maintenance),
            target_weight_kg: Some(60.0),
        };
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn out_of_range_fields_are_collected() {
        let profile = UserProfile {
            age: Some(200),
            height_cm: Some(10.0),
            allergies: vec!["  ".to_string()],
            ..UserProfile::default()
        };
        let err = profile.validate().unwrap_err();
        assert_eq!(err.issues.len(), 3);
    }

    #[test]
    fn unknown_enum_value_is_rejected_at_parse_time() {
        let result: Result<UserProfile, _> =
            serde_json::from_str(r#"{"goal":"get_swole"}"#);
        assert!(result.is_err());
    }
}
