use serde::Serialize;

use crate::models::energy_log::EnergyLogRecord;

/// One chart point per logged day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub energy: i32,
    /// 10 minus energy.
    pub fatigue: i32,
    pub activity: i32,
    pub sleep_hours: Option<f64>,
    pub stress_level: Option<i32>,
}

/// Chart series for `logs`, oldest first regardless of input order.
pub fn trend_points(logs: &[EnergyLogRecord]) -> Vec<TrendPoint> {
    let mut sorted: Vec<&EnergyLogRecord> = logs.iter().collect();
    sorted.sort_by_key(|log| log.log_date);

    sorted
        .into_iter()
        .map(|log| TrendPoint {
            date: log.log_date.format("%b %-d").to_string(),
            energy: log.entry.energy_level,
            fatigue: 10 - log.entry.energy_level,
            activity: log.entry.activity_intensity.as_level(),
            sleep_hours: log.entry.sleep_hours,
            stress_level: log.entry.stress_level,
        })
        .collect()
}
