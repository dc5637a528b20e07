use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::energy_log::{ActivityIntensity, ActivityType, EmotionTag, EnergyLogRecord};

pub const MIN_LOGS_FOR_SUMMARY: usize = 2;
pub const MAX_LOGS_FOR_SUMMARY: usize = 14;

pub const NEED_MORE_DATA_MESSAGE: &str =
    "I need at least a couple of entries to spot any trends. Keep logging your vibes!";
pub const FALLBACK_MESSAGE: &str =
    "I couldn't generate an analysis at this time. Please try again later.";

/// External text generation. Implementations return the model's raw text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Reduced view of a log used only to build the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifiedLogView {
    pub date: String,
    pub energy_level: i32,
    pub emotion_tag: Option<EmotionTag>,
    pub sleep_hours: Option<f64>,
    pub stress_level: Option<i32>,
    pub activity_type: Option<ActivityType>,
    pub activity_intensity: ActivityIntensity,
    pub quick_note: Option<String>,
}

impl From<&EnergyLogRecord> for SimplifiedLogView {
    fn from(log: &EnergyLogRecord) -> Self {
        Self {
            date: log.log_date.format("%b %-d").to_string(),
            energy_level: log.entry.energy_level,
            emotion_tag: log.entry.emotion_tag,
            sleep_hours: log.entry.sleep_hours,
            stress_level: log.entry.stress_level,
            activity_type: log.entry.activity_type,
            activity_intensity: log.entry.activity_intensity,
            quick_note: log.entry.note.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Model,
    Fallback,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub analysis: String,
    pub source: SummarySource,
    pub log_count: usize,
}

/// The only shape accepted back from the model.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisOutput {
    analysis: String,
}

pub fn render_prompt(logs: &[SimplifiedLogView]) -> String {
    let mut prompt = String::from(
        r#"You are Vibe Vault's friendly and insightful wellness assistant.
Analyze the energy log data below for a user and provide a brief analysis that:
1. Identifies noticeable patterns or trends in energy levels.
2. Explores potential correlations, e.g. whether energy is higher after more sleep, whether stress affects energy, and whether activity type or intensity tracks with energy.
3. Offers 1-2 general, positive and encouraging wellness suggestions. Do NOT provide medical advice.
4. Stays concise: 3-5 sentences or a few bullet points.
5. If the data is sparse (fewer than 3 logs or few details), kindly says that more data would allow a richer analysis, while still offering a small observation if possible.
6. May use light markdown such as bullet points.

Here are the recent energy logs:
"#,
    );

    if logs.is_empty() {
        prompt.push_str("No logs provided for analysis.\n");
    }

    for log in logs {
        let _ = writeln!(prompt, "- **{}**:", log.date);
        let _ = writeln!(prompt, "  - Energy: {}/10", log.energy_level);
        if let Some(emotion) = log.emotion_tag {
            let _ = writeln!(prompt, "  - Emotion: {}", emotion);
        }
        if let Some(hours) = log.sleep_hours {
            let _ = writeln!(prompt, "  - Sleep: {} hours", hours);
        }
        if let Some(stress) = log.stress_level {
            let _ = writeln!(prompt, "  - Stress: {}/5", stress);
        }
        if let Some(activity) = log.activity_type {
            let _ = writeln!(prompt, "  - Activity: {} ({})", activity, log.activity_intensity);
        }
        if let Some(note) = &log.quick_note {
            let _ = writeln!(prompt, "  - Note: \"{}\"", note);
        }
    }

    prompt.push_str(
        r#"
Respond with only a JSON object of this exact shape and nothing else:
{"analysis": "your analysis text"}"#,
    );
    prompt
}

/// Pull the JSON object out of a model reply, tolerating code fences or
/// surrounding prose.
fn parse_analysis(text: &str) -> anyhow::Result<String> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => anyhow::bail!("model reply contains no JSON object"),
    };

    let output: AnalysisOutput = serde_json::from_str(json)?;
    let analysis = output.analysis.trim();
    if analysis.is_empty() {
        anyhow::bail!("model returned an empty analysis");
    }
    Ok(analysis.to_string())
}

/// Turns recent logs into a model-written summary, absorbing every failure
/// into a fixed message.
#[derive(Clone)]
pub struct SummaryComposer {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl SummaryComposer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// `logs` must be in chronological order (oldest first).
    pub async fn summarize(&self, logs: &[EnergyLogRecord]) -> Summary {
        if logs.len() < MIN_LOGS_FOR_SUMMARY {
            return Summary {
                analysis: NEED_MORE_DATA_MESSAGE.into(),
                source: SummarySource::InsufficientData,
                log_count: logs.len(),
            };
        }

        let logs = if logs.len() > MAX_LOGS_FOR_SUMMARY {
            tracing::warn!(
                received = logs.len(),
                kept = MAX_LOGS_FOR_SUMMARY,
                "Too many logs for summary, keeping the most recent"
            );
            &logs[logs.len() - MAX_LOGS_FOR_SUMMARY..]
        } else {
            logs
        };

        let fallback = Summary {
            analysis: FALLBACK_MESSAGE.into(),
            source: SummarySource::Fallback,
            log_count: logs.len(),
        };

        let Some(generator) = &self.generator else {
            tracing::warn!("No text generator configured, using fallback summary");
            return fallback;
        };

        let views: Vec<SimplifiedLogView> = logs.iter().map(SimplifiedLogView::from).collect();
        let prompt = render_prompt(&views);

        let reply = match generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Text generation failed, using fallback summary");
                return fallback;
            }
        };

        match parse_analysis(&reply) {
            Ok(analysis) => Summary {
                analysis,
                source: SummarySource::Model,
                log_count: logs.len(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Unusable model reply, using fallback summary");
                fallback
            }
        }
    }
}
