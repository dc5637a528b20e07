use std::borrow::Cow;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// Logs may not be dated before January 1st of this year.
pub const EARLIEST_LOG_YEAR: i32 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

/// Declares a closed set of labels stored as TEXT and sent over the wire as
/// the exact label string.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[cfg(test)]
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

text_enum!(ActivityIntensity {
    None => "None",
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

text_enum!(ActivityType {
    Gym => "Gym",
    Running => "Running",
    Walking => "Walking",
    Cycling => "Cycling",
    Swimming => "Swimming",
    Yoga => "Yoga",
    Pilates => "Pilates",
    Sports => "Sports",
    StrengthTraining => "Strength Training",
    Hiit => "HIIT",
    Dance => "Dance",
    Hiking => "Hiking",
    Housework => "Housework",
    Gardening => "Gardening",
    Stretching => "Stretching",
    RestDay => "Rest Day",
    Sedentary => "Sedentary",
    Other => "Other",
});

text_enum!(EmotionTag {
    Happy => "Happy",
    Content => "Content",
    Grateful => "Grateful",
    Excited => "Excited",
    Optimistic => "Optimistic",
    Neutral => "Neutral",
    Okay => "Okay",
    Calm => "Calm",
    Relaxed => "Relaxed",
    Peaceful => "Peaceful",
    Stressed => "Stressed",
    Anxious => "Anxious",
    Overwhelmed => "Overwhelmed",
    Worried => "Worried",
    Sad => "Sad",
    Disappointed => "Disappointed",
    Lonely => "Lonely",
    Grieving => "Grieving",
    Energetic => "Energetic",
    Productive => "Productive",
    Focused => "Focused",
    Motivated => "Motivated",
    Inspired => "Inspired",
    Tired => "Tired",
    Fatigued => "Fatigued",
    Exhausted => "Exhausted",
    Irritable => "Irritable",
    Frustrated => "Frustrated",
    Angry => "Angry",
    Other => "Other",
});

text_enum!(WeatherType {
    Sunny => "Sunny",
    Cloudy => "Cloudy",
    Rainy => "Rainy",
    Snowy => "Snowy",
    Windy => "Windy",
    Foggy => "Foggy",
    Stormy => "Stormy",
    Other => "Other",
});

text_enum!(SocialInteraction {
    Positive => "Positive",
    Neutral => "Neutral",
    Negative => "Negative",
    Draining => "Draining",
    None => "None",
});

text_enum!(Workload {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Overloaded => "Overloaded",
});

text_enum!(MenstrualCyclePhase {
    Menstruation => "Menstruation",
    Follicular => "Follicular",
    Ovulation => "Ovulation",
    Luteal => "Luteal",
    None => "None",
    Unknown => "Unknown",
});

impl ActivityIntensity {
    /// Chart scale: None=1 through High=4.
    pub fn as_level(&self) -> i32 {
        match self {
            Self::None => 1,
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
        }
    }
}

/// The user-editable part of a log after validation. Absent optional fields
/// are `None`, never empty strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyLogEntry {
    pub energy_level: i32,
    pub note: Option<String>,

    pub sleep_hours: Option<f64>,
    pub sleep_quality: Option<i32>,
    #[serde(serialize_with = "hhmm::serialize")]
    pub bedtime: Option<NaiveTime>,
    #[serde(serialize_with = "hhmm::serialize")]
    pub wake_up_time: Option<NaiveTime>,
    pub sleep_notes: Option<String>,

    pub hydration_liters: f64,
    pub meal_tags: Option<String>,
    pub caffeine_intake: Option<String>,
    pub alcohol_intake: Option<String>,
    pub sugar_intake_rating: Option<i32>,

    pub activity_type: Option<ActivityType>,
    pub activity_intensity: ActivityIntensity,
    pub activity_duration_minutes: Option<i32>,

    pub emotion_tag: Option<EmotionTag>,
    pub stress_level: Option<i32>,

    pub general_health_rating: Option<i32>,
    pub symptoms: Option<String>,
    pub medication_taken: Option<String>,

    pub weather_type: Option<WeatherType>,
    pub social_interactions: Option<SocialInteraction>,
    pub workload: Option<Workload>,
    pub menstrual_cycle_phase: Option<MenstrualCyclePhase>,

    pub journal_note: Option<String>,
    pub energy_goal: Option<i32>,
}

/// Streak counters written back by the server on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakStatus {
    pub log_streak_count: i32,
    pub reward_badge: Option<String>,
}

/// A stored log: one per (user, date).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyLogRecord {
    pub id: Uuid,
    pub user_identifier: String,
    pub log_date: NaiveDate,
    #[serde(flatten)]
    pub entry: EnergyLogEntry,
    pub log_streak_count: Option<i32>,
    pub reward_badge: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw save payload as sent by the client. Enumerated fields arrive as
/// strings so that an unknown label is reported against its field name.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LogSubmission {
    #[validate(required, range(min = 1, max = 10, message = "Energy level must be between 1 and 10"))]
    pub energy_level: Option<i32>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,

    #[validate(range(min = 0.0, max = 24.0, message = "Sleep hours must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,
    #[validate(range(min = 1, max = 5, message = "Sleep quality must be between 1 and 5"))]
    pub sleep_quality: Option<i32>,
    #[validate(custom = "validate_hhmm")]
    pub bedtime: Option<String>,
    #[validate(custom = "validate_hhmm")]
    pub wake_up_time: Option<String>,
    #[validate(length(max = 500, message = "Sleep notes must be at most 500 characters"))]
    pub sleep_notes: Option<String>,

    #[validate(required, range(min = 0.0, message = "Hydration cannot be negative"))]
    pub hydration_liters: Option<f64>,
    #[validate(length(max = 500, message = "Meal tags must be at most 500 characters"))]
    pub meal_tags: Option<String>,
    #[validate(length(max = 100, message = "Caffeine intake must be at most 100 characters"))]
    pub caffeine_intake: Option<String>,
    #[validate(length(max = 100, message = "Alcohol intake must be at most 100 characters"))]
    pub alcohol_intake: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Sugar intake rating must be between 1 and 5"))]
    pub sugar_intake_rating: Option<i32>,

    pub activity_type: Option<String>,
    #[validate(required)]
    pub activity_intensity: Option<String>,
    #[validate(range(min = 0, message = "Activity duration cannot be negative"))]
    pub activity_duration_minutes: Option<i32>,

    pub emotion_tag: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Stress level must be between 1 and 5"))]
    pub stress_level: Option<i32>,

    #[validate(range(min = 1, max = 5, message = "General health rating must be between 1 and 5"))]
    pub general_health_rating: Option<i32>,
    #[validate(length(max = 500, message = "Symptoms must be at most 500 characters"))]
    pub symptoms: Option<String>,
    #[validate(length(max = 200, message = "Medication must be at most 200 characters"))]
    pub medication_taken: Option<String>,

    pub weather_type: Option<String>,
    pub social_interactions: Option<String>,
    pub workload: Option<String>,
    pub menstrual_cycle_phase: Option<String>,

    #[validate(length(max = 2000, message = "Journal note must be at most 2000 characters"))]
    pub journal_note: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Energy goal must be between 1 and 10"))]
    pub energy_goal: Option<i32>,
}

/// Every field a submission may carry, as named on the wire.
pub const SUBMISSION_FIELDS: &[&str] = &[
    "energy_level",
    "note",
    "sleep_hours",
    "sleep_quality",
    "bedtime",
    "wake_up_time",
    "sleep_notes",
    "hydration_liters",
    "meal_tags",
    "caffeine_intake",
    "alcohol_intake",
    "sugar_intake_rating",
    "activity_type",
    "activity_intensity",
    "activity_duration_minutes",
    "emotion_tag",
    "stress_level",
    "general_health_rating",
    "symptoms",
    "medication_taken",
    "weather_type",
    "social_interactions",
    "workload",
    "menstrual_cycle_phase",
    "journal_note",
    "energy_goal",
];

/// A body that could not be decoded at all. The error is filed under the
/// offending submission field when `field` names one, otherwise under `body`.
pub fn undecodable_body(field: Option<&str>, message: String) -> ValidationErrors {
    let field = field
        .and_then(|f| SUBMISSION_FIELDS.iter().copied().find(|known| *known == f))
        .unwrap_or("body");

    let mut err = ValidationError::new("invalid_type");
    err.message = Some(Cow::from(message));
    let mut errors = ValidationErrors::new();
    errors.add(field, err);
    errors
}

impl LogSubmission {
    /// Validate every field and produce the normalized entry. All offending
    /// fields are reported together.
    pub fn normalize(self) -> Result<EnergyLogEntry, ValidationErrors> {
        let submission = self.without_blanks();

        let mut errors = match submission.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let activity_type = parse_label(&mut errors, "activity_type", &submission.activity_type);
        let activity_intensity =
            parse_label(&mut errors, "activity_intensity", &submission.activity_intensity);
        let emotion_tag = parse_label(&mut errors, "emotion_tag", &submission.emotion_tag);
        let weather_type = parse_label(&mut errors, "weather_type", &submission.weather_type);
        let social_interactions =
            parse_label(&mut errors, "social_interactions", &submission.social_interactions);
        let workload = parse_label(&mut errors, "workload", &submission.workload);
        let menstrual_cycle_phase =
            parse_label(&mut errors, "menstrual_cycle_phase", &submission.menstrual_cycle_phase);

        if !errors.errors().is_empty() {
            return Err(errors);
        }

        let (Some(energy_level), Some(hydration_liters), Some(activity_intensity)) = (
            submission.energy_level,
            submission.hydration_liters,
            activity_intensity,
        ) else {
            // Only reachable if the `required` rules above change.
            let mut errors = ValidationErrors::new();
            let present = [
                ("energy_level", submission.energy_level.is_some()),
                ("hydration_liters", submission.hydration_liters.is_some()),
                ("activity_intensity", activity_intensity.is_some()),
            ];
            for (field, present) in present {
                if !present {
                    errors.add(field, ValidationError::new("required"));
                }
            }
            return Err(errors);
        };

        Ok(EnergyLogEntry {
            energy_level,
            note: submission.note,
            sleep_hours: submission.sleep_hours,
            sleep_quality: submission.sleep_quality,
            bedtime: submission.bedtime.as_deref().and_then(parse_hhmm),
            wake_up_time: submission.wake_up_time.as_deref().and_then(parse_hhmm),
            sleep_notes: submission.sleep_notes,
            hydration_liters,
            meal_tags: submission.meal_tags,
            caffeine_intake: submission.caffeine_intake,
            alcohol_intake: submission.alcohol_intake,
            sugar_intake_rating: submission.sugar_intake_rating,
            activity_type,
            activity_intensity,
            activity_duration_minutes: submission.activity_duration_minutes,
            emotion_tag,
            stress_level: submission.stress_level,
            general_health_rating: submission.general_health_rating,
            symptoms: submission.symptoms,
            medication_taken: submission.medication_taken,
            weather_type,
            social_interactions,
            workload,
            menstrual_cycle_phase,
            journal_note: submission.journal_note,
            energy_goal: submission.energy_goal,
        })
    }

    fn without_blanks(self) -> Self {
        Self {
            note: non_blank(self.note),
            bedtime: non_blank(self.bedtime),
            wake_up_time: non_blank(self.wake_up_time),
            sleep_notes: non_blank(self.sleep_notes),
            meal_tags: non_blank(self.meal_tags),
            caffeine_intake: non_blank(self.caffeine_intake),
            alcohol_intake: non_blank(self.alcohol_intake),
            activity_type: non_blank(self.activity_type),
            activity_intensity: non_blank(self.activity_intensity),
            emotion_tag: non_blank(self.emotion_tag),
            symptoms: non_blank(self.symptoms),
            medication_taken: non_blank(self.medication_taken),
            weather_type: non_blank(self.weather_type),
            social_interactions: non_blank(self.social_interactions),
            workload: non_blank(self.workload),
            menstrual_cycle_phase: non_blank(self.menstrual_cycle_phase),
            journal_note: non_blank(self.journal_note),
            ..self
        }
    }
}

/// Parse a "YYYY-MM-DD" log date and check it lies between
/// January 1st of [`EARLIEST_LOG_YEAR`] and one day after `today`.
pub fn parse_log_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let parsed = if raw.len() == 10 {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    } else {
        None
    };

    let Some(date) = parsed else {
        let mut err = ValidationError::new("date_format");
        err.message = Some(Cow::from("Log date must use the YYYY-MM-DD format"));
        err.add_param(Cow::from("value"), &raw);
        errors.add("log_date", err);
        return Err(errors);
    };

    let earliest = NaiveDate::from_yo_opt(EARLIEST_LOG_YEAR, 1).unwrap_or(NaiveDate::MIN);
    let latest = today.succ_opt().unwrap_or(today);
    if date < earliest || date > latest {
        let mut err = ValidationError::new("date_range");
        err.message = Some(Cow::from("Log date must be between 2000-01-01 and today"));
        err.add_param(Cow::from("value"), &raw);
        errors.add("log_date", err);
        return Err(errors);
    }

    Ok(date)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_label<T: FromStr<Err = UnknownVariant>>(
    errors: &mut ValidationErrors,
    field: &'static str,
    raw: &Option<String>,
) -> Option<T> {
    let raw = raw.as_deref()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(unknown) => {
            let mut err = ValidationError::new("one_of");
            err.message = Some(Cow::from(format!("`{}` is not an allowed value", unknown.0)));
            err.add_param(Cow::from("value"), &raw);
            errors.add(field, err);
            None
        }
    }
}

/// Strict 24-hour "HH:MM".
fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

fn validate_hhmm(value: &str) -> Result<(), ValidationError> {
    if parse_hhmm(value).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("time_format");
    err.message = Some(Cow::from("Invalid time format. Use HH:MM"));
    Err(err)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn minimal_submission(energy: i32) -> LogSubmission {
        LogSubmission {
            energy_level: Some(energy),
            hydration_liters: Some(1.5),
            activity_intensity: Some("None".into()),
            ..Default::default()
        }
    }

    pub(crate) fn full_submission() -> LogSubmission {
        LogSubmission {
            energy_level: Some(8),
            note: Some("Felt sharp after the morning run".into()),
            sleep_hours: Some(7.75),
            sleep_quality: Some(4),
            bedtime: Some("22:45".into()),
            wake_up_time: Some("06:30".into()),
            sleep_notes: Some("Woke once around 3".into()),
            hydration_liters: Some(2.25),
            meal_tags: Some("oats, salad, salmon".into()),
            caffeine_intake: Some("1 espresso".into()),
            alcohol_intake: Some("none".into()),
            sugar_intake_rating: Some(2),
            activity_type: Some("Strength Training".into()),
            activity_intensity: Some("High".into()),
            activity_duration_minutes: Some(45),
            emotion_tag: Some("Motivated".into()),
            stress_level: Some(2),
            general_health_rating: Some(5),
            symptoms: Some("slight knee ache".into()),
            medication_taken: Some("ibuprofen".into()),
            weather_type: Some("Sunny".into()),
            social_interactions: Some("Positive".into()),
            workload: Some("Overloaded".into()),
            menstrual_cycle_phase: Some("Follicular".into()),
            journal_note: Some("Long day but a good one.".into()),
            energy_goal: Some(9),
        }
    }

    fn failing_fields(errors: &ValidationErrors) -> Vec<&'static str> {
        let mut fields: Vec<_> = errors.field_errors().keys().copied().collect();
        fields.sort();
        fields
    }

    #[test]
    fn test_minimal_submission_normalizes() {
        let entry = minimal_submission(5).normalize().unwrap();
        assert_eq!(entry.energy_level, 5);
        assert_eq!(entry.activity_intensity, ActivityIntensity::None);
        assert_eq!(entry.hydration_liters, 1.5);
        assert!(entry.note.is_none());
        assert!(entry.activity_type.is_none());
    }

    #[test]
    fn test_full_submission_keeps_every_field() {
        let entry = full_submission().normalize().unwrap();
        assert_eq!(entry.sleep_hours, Some(7.75));
        assert_eq!(entry.bedtime, NaiveTime::from_hms_opt(22, 45, 0));
        assert_eq!(entry.activity_type, Some(ActivityType::StrengthTraining));
        assert_eq!(entry.emotion_tag, Some(EmotionTag::Motivated));
        assert_eq!(entry.workload, Some(Workload::Overloaded));
        assert_eq!(entry.menstrual_cycle_phase, Some(MenstrualCyclePhase::Follicular));
        assert_eq!(entry.energy_goal, Some(9));
    }

    #[test]
    fn test_energy_out_of_range_is_rejected() {
        for energy in [0, 11, -3] {
            let errors = minimal_submission(energy).normalize().unwrap_err();
            assert_eq!(failing_fields(&errors), vec!["energy_level"]);
        }
    }

    #[test]
    fn test_missing_required_fields_are_named() {
        let errors = LogSubmission::default().normalize().unwrap_err();
        assert_eq!(
            failing_fields(&errors),
            vec!["activity_intensity", "energy_level", "hydration_liters"]
        );

        let submission = LogSubmission {
            hydration_liters: None,
            ..minimal_submission(5)
        };
        let errors = submission.normalize().unwrap_err();
        assert_eq!(failing_fields(&errors), vec!["hydration_liters"]);
    }

    #[test]
    fn test_undecodable_body_is_filed_under_known_field() {
        let errors = undecodable_body(Some("sleep_quality"), "expected i32".into());
        assert_eq!(failing_fields(&errors), vec!["sleep_quality"]);

        for field in [None, Some("not_a_field")] {
            let errors = undecodable_body(field, "expected value".into());
            assert_eq!(failing_fields(&errors), vec!["body"]);
        }
    }

    #[test]
    fn test_every_offending_field_is_reported() {
        let submission = LogSubmission {
            hydration_liters: Some(-0.5),
            sleep_quality: Some(6),
            bedtime: Some("7:30".into()),
            wake_up_time: Some("24:00".into()),
            emotion_tag: Some("Giddy".into()),
            workload: Some("medium".into()),
            ..minimal_submission(5)
        };
        let errors = submission.normalize().unwrap_err();
        assert_eq!(
            failing_fields(&errors),
            vec![
                "bedtime",
                "emotion_tag",
                "hydration_liters",
                "sleep_quality",
                "wake_up_time",
                "workload"
            ]
        );
    }

    #[test]
    fn test_blank_strings_become_absent() {
        let submission = LogSubmission {
            note: Some("   ".into()),
            bedtime: Some(String::new()),
            emotion_tag: Some(String::new()),
            ..minimal_submission(6)
        };
        let entry = submission.normalize().unwrap();
        assert!(entry.note.is_none());
        assert!(entry.bedtime.is_none());
        assert!(entry.emotion_tag.is_none());
    }

    #[test]
    fn test_text_limits() {
        let submission = LogSubmission {
            journal_note: Some("x".repeat(2001)),
            ..minimal_submission(6)
        };
        let errors = submission.normalize().unwrap_err();
        assert_eq!(failing_fields(&errors), vec!["journal_note"]);
    }

    #[test]
    fn test_parse_log_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(
            parse_log_date("2024-06-03", today).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
        );
        assert!(parse_log_date("2024-06-11", today).is_ok());
        assert!(parse_log_date("2024-06-12", today).is_err());
        assert!(parse_log_date("1999-12-31", today).is_err());
        assert!(parse_log_date("2024-6-3", today).is_err());
        assert!(parse_log_date("June 3", today).is_err());
    }

    #[test]
    fn test_labels_round_trip_through_text() {
        for tag in EmotionTag::ALL {
            assert_eq!(tag.as_str().parse::<EmotionTag>().unwrap(), *tag);
        }
        assert_eq!(EmotionTag::ALL.len(), 30);
        assert_eq!("Rest Day".parse::<ActivityType>().unwrap(), ActivityType::RestDay);
        assert!("rest day".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_entry_serializes_times_as_hhmm() {
        let entry = full_submission().normalize().unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["bedtime"], "22:45");
        assert_eq!(json["activity_type"], "Strength Training");
        assert_eq!(json["sleep_hours"], 7.75);
        assert!(json["sleep_hours"].is_number());
    }
}
