use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{LogStore, StorageError};
use crate::models::energy_log::{
    EnergyLogEntry, EnergyLogRecord, StreakStatus, UnknownVariant,
};

/// `energy_logs` row as stored. Enumerated columns are TEXT.
#[derive(Debug, FromRow)]
struct EnergyLogRow {
    id: Uuid,
    user_identifier: String,
    log_date: NaiveDate,
    energy_level: i32,
    quick_note: Option<String>,
    sleep_hours: Option<f64>,
    sleep_quality: Option<i32>,
    bedtime: Option<NaiveTime>,
    wake_up_time: Option<NaiveTime>,
    sleep_notes: Option<String>,
    hydration_liters: f64,
    meal_tags: Option<String>,
    caffeine_intake: Option<String>,
    alcohol_intake: Option<String>,
    sugar_intake_rating: Option<i32>,
    activity_type: Option<String>,
    activity_intensity: String,
    activity_duration_minutes: Option<i32>,
    emotion_tag: Option<String>,
    stress_level: Option<i32>,
    general_health_rating: Option<i32>,
    symptoms: Option<String>,
    medication_taken: Option<String>,
    weather_type: Option<String>,
    social_interactions: Option<String>,
    workload: Option<String>,
    menstrual_cycle_phase: Option<String>,
    journal_note: Option<String>,
    energy_goal: Option<i32>,
    log_streak_count: Option<i32>,
    reward_badge: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn label<T: FromStr<Err = UnknownVariant>>(
    column: &'static str,
    value: String,
) -> Result<T, StorageError> {
    value
        .parse()
        .map_err(|UnknownVariant(value)| StorageError::CorruptRow { column, value })
}

fn optional_label<T: FromStr<Err = UnknownVariant>>(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<T>, StorageError> {
    value.map(|v| label(column, v)).transpose()
}

impl TryFrom<EnergyLogRow> for EnergyLogRecord {
    type Error = StorageError;

    fn try_from(row: EnergyLogRow) -> Result<Self, Self::Error> {
        let entry = EnergyLogEntry {
            energy_level: row.energy_level,
            note: row.quick_note,
            sleep_hours: row.sleep_hours,
            sleep_quality: row.sleep_quality,
            bedtime: row.bedtime,
            wake_up_time: row.wake_up_time,
            sleep_notes: row.sleep_notes,
            hydration_liters: row.hydration_liters,
            meal_tags: row.meal_tags,
            caffeine_intake: row.caffeine_intake,
            alcohol_intake: row.alcohol_intake,
            sugar_intake_rating: row.sugar_intake_rating,
            activity_type: optional_label("activity_type", row.activity_type)?,
            activity_intensity: label("activity_intensity", row.activity_intensity)?,
            activity_duration_minutes: row.activity_duration_minutes,
            emotion_tag: optional_label("emotion_tag", row.emotion_tag)?,
            stress_level: row.stress_level,
            general_health_rating: row.general_health_rating,
            symptoms: row.symptoms,
            medication_taken: row.medication_taken,
            weather_type: optional_label("weather_type", row.weather_type)?,
            social_interactions: optional_label("social_interactions", row.social_interactions)?,
            workload: optional_label("workload", row.workload)?,
            menstrual_cycle_phase: optional_label(
                "menstrual_cycle_phase",
                row.menstrual_cycle_phase,
            )?,
            journal_note: row.journal_note,
            energy_goal: row.energy_goal,
        };

        Ok(EnergyLogRecord {
            id: row.id,
            user_identifier: row.user_identifier,
            log_date: row.log_date,
            entry,
            log_streak_count: row.log_streak_count,
            reward_badge: row.reward_badge,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgLogStore {
    db: PgPool,
}

impl PgLogStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn upsert(
        &self,
        user_id: &str,
        log_date: NaiveDate,
        entry: &EnergyLogEntry,
        streak: &StreakStatus,
    ) -> Result<EnergyLogRecord, StorageError> {
        // Every editable column is overwritten; id and created_at survive.
        let row = sqlx::query_as::<_, EnergyLogRow>(
            r#"
            INSERT INTO energy_logs (
                id, user_identifier, log_date,
                energy_level, quick_note,
                sleep_hours, sleep_quality, bedtime, wake_up_time, sleep_notes,
                hydration_liters, meal_tags, caffeine_intake, alcohol_intake, sugar_intake_rating,
                activity_type, activity_intensity, activity_duration_minutes,
                emotion_tag, stress_level,
                general_health_rating, symptoms, medication_taken,
                weather_type, social_interactions, workload, menstrual_cycle_phase,
                journal_note, energy_goal, log_streak_count, reward_badge
            )
            VALUES (
                $1, $2, $3,
                $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15,
                $16, $17, $18,
                $19, $20,
                $21, $22, $23,
                $24, $25, $26, $27,
                $28, $29, $30, $31
            )
            ON CONFLICT (user_identifier, log_date) DO UPDATE SET
                energy_level = EXCLUDED.energy_level,
                quick_note = EXCLUDED.quick_note,
                sleep_hours = EXCLUDED.sleep_hours,
                sleep_quality = EXCLUDED.sleep_quality,
                bedtime = EXCLUDED.bedtime,
                wake_up_time = EXCLUDED.wake_up_time,
                sleep_notes = EXCLUDED.sleep_notes,
                hydration_liters = EXCLUDED.hydration_liters,
                meal_tags = EXCLUDED.meal_tags,
                caffeine_intake = EXCLUDED.caffeine_intake,
                alcohol_intake = EXCLUDED.alcohol_intake,
                sugar_intake_rating = EXCLUDED.sugar_intake_rating,
                activity_type = EXCLUDED.activity_type,
                activity_intensity = EXCLUDED.activity_intensity,
                activity_duration_minutes = EXCLUDED.activity_duration_minutes,
                emotion_tag = EXCLUDED.emotion_tag,
                stress_level = EXCLUDED.stress_level,
                general_health_rating = EXCLUDED.general_health_rating,
                symptoms = EXCLUDED.symptoms,
                medication_taken = EXCLUDED.medication_taken,
                weather_type = EXCLUDED.weather_type,
                social_interactions = EXCLUDED.social_interactions,
                workload = EXCLUDED.workload,
                menstrual_cycle_phase = EXCLUDED.menstrual_cycle_phase,
                journal_note = EXCLUDED.journal_note,
                energy_goal = EXCLUDED.energy_goal,
                log_streak_count = EXCLUDED.log_streak_count,
                reward_badge = EXCLUDED.reward_badge,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(log_date)
        .bind(entry.energy_level)
        .bind(&entry.note)
        .bind(entry.sleep_hours)
        .bind(entry.sleep_quality)
        .bind(entry.bedtime)
        .bind(entry.wake_up_time)
        .bind(&entry.sleep_notes)
        .bind(entry.hydration_liters)
        .bind(&entry.meal_tags)
        .bind(&entry.caffeine_intake)
        .bind(&entry.alcohol_intake)
        .bind(entry.sugar_intake_rating)
        .bind(entry.activity_type.map(|v| v.as_str()))
        .bind(entry.activity_intensity.as_str())
        .bind(entry.activity_duration_minutes)
        .bind(entry.emotion_tag.map(|v| v.as_str()))
        .bind(entry.stress_level)
        .bind(entry.general_health_rating)
        .bind(&entry.symptoms)
        .bind(&entry.medication_taken)
        .bind(entry.weather_type.map(|v| v.as_str()))
        .bind(entry.social_interactions.map(|v| v.as_str()))
        .bind(entry.workload.map(|v| v.as_str()))
        .bind(entry.menstrual_cycle_phase.map(|v| v.as_str()))
        .bind(&entry.journal_note)
        .bind(entry.energy_goal)
        .bind(streak.log_streak_count)
        .bind(&streak.reward_badge)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn get_by_date(
        &self,
        user_id: &str,
        log_date: NaiveDate,
    ) -> Result<Option<EnergyLogRecord>, StorageError> {
        let row = sqlx::query_as::<_, EnergyLogRow>(
            "SELECT * FROM energy_logs WHERE user_identifier = $1 AND log_date = $2",
        )
        .bind(user_id)
        .bind(log_date)
        .fetch_optional(&self.db)
        .await?;

        row.map(EnergyLogRecord::try_from).transpose()
    }

    async fn get_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<EnergyLogRecord>, StorageError> {
        let rows = sqlx::query_as::<_, EnergyLogRow>(
            r#"
            SELECT * FROM energy_logs
            WHERE user_identifier = $1
            ORDER BY log_date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(EnergyLogRecord::try_from).collect()
    }

    async fn logged_dates_before(
        &self,
        user_id: &str,
        before: NaiveDate,
        limit: i64,
    ) -> Result<Vec<NaiveDate>, StorageError> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT log_date FROM energy_logs
            WHERE user_identifier = $1 AND log_date < $2
            ORDER BY log_date DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(dates)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::energy_log::tests::full_submission;

    fn label_text<T: ToString>(value: Option<T>) -> Option<String> {
        value.map(|v| v.to_string())
    }

    /// A row as `upsert` would write it for `entry`.
    fn row_for(entry: &EnergyLogEntry) -> EnergyLogRow {
        EnergyLogRow {
            id: Uuid::new_v4(),
            user_identifier: "user_001".into(),
            log_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            energy_level: entry.energy_level,
            quick_note: entry.note.clone(),
            sleep_hours: entry.sleep_hours,
            sleep_quality: entry.sleep_quality,
            bedtime: entry.bedtime,
            wake_up_time: entry.wake_up_time,
            sleep_notes: entry.sleep_notes.clone(),
            hydration_liters: entry.hydration_liters,
            meal_tags: entry.meal_tags.clone(),
            caffeine_intake: entry.caffeine_intake.clone(),
            alcohol_intake: entry.alcohol_intake.clone(),
            sugar_intake_rating: entry.sugar_intake_rating,
            activity_type: label_text(entry.activity_type),
            activity_intensity: entry.activity_intensity.to_string(),
            activity_duration_minutes: entry.activity_duration_minutes,
            emotion_tag: label_text(entry.emotion_tag),
            stress_level: entry.stress_level,
            general_health_rating: entry.general_health_rating,
            symptoms: entry.symptoms.clone(),
            medication_taken: entry.medication_taken.clone(),
            weather_type: label_text(entry.weather_type),
            social_interactions: label_text(entry.social_interactions),
            workload: label_text(entry.workload),
            menstrual_cycle_phase: label_text(entry.menstrual_cycle_phase),
            journal_note: entry.journal_note.clone(),
            energy_goal: entry.energy_goal,
            log_streak_count: Some(4),
            reward_badge: Some("Getting Started".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_row_maps_back_to_entry() {
        let entry = full_submission().normalize().unwrap();
        let row = row_for(&entry);
        let id = row.id;

        let record = EnergyLogRecord::try_from(row).unwrap();
        assert_eq!(record.entry, entry);
        assert_eq!(record.id, id);
        assert_eq!(record.user_identifier, "user_001");
        assert_eq!(record.log_streak_count, Some(4));
        assert_eq!(record.reward_badge.as_deref(), Some("Getting Started"));
        assert_eq!(record.entry.bedtime, NaiveTime::from_hms_opt(22, 45, 0));
        assert_eq!(record.entry.activity_type.map(|t| t.as_str()), Some("Strength Training"));
    }

    #[test]
    fn test_unknown_stored_label_is_a_corrupt_row() {
        let entry = full_submission().normalize().unwrap();
        let row = EnergyLogRow {
            emotion_tag: Some("Giddy".into()),
            ..row_for(&entry)
        };

        match EnergyLogRecord::try_from(row) {
            Err(StorageError::CorruptRow { column, value }) => {
                assert_eq!(column, "emotion_tag");
                assert_eq!(value, "Giddy");
            }
            other => panic!("expected a corrupt row, got {other:?}"),
        }
    }

    #[test]
    fn test_required_label_column_is_checked_too() {
        let entry = full_submission().normalize().unwrap();
        let row = EnergyLogRow {
            activity_intensity: "extreme".into(),
            ..row_for(&entry)
        };

        assert!(matches!(
            EnergyLogRecord::try_from(row),
            Err(StorageError::CorruptRow { column: "activity_intensity", .. })
        ));
    }
}
