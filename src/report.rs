//! Retrospective report requester
//!
//! Packages session statistics for an external summarization service and
//! turns its response into an [`AIAnalysis`]. The service is a trait so hosts
//! can plug in any model; the crate itself never performs network I/O.
//!
//! A failed request is never surfaced as a raw error in the report. It is
//! replaced by a fixed fallback analysis plus a dismissable banner message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{AIAnalysis, EngagementLevel, SessionStats};

/// Banner shown to the user when synthesis fails
pub const ANALYSIS_FAILED_BANNER: &str = "Diagnostic synthesis failed. Please retry.";

const DEFAULT_SUMMARY: &str = "Unable to synthesize behavioral data.";
const DEFAULT_TIPS: [&str; 3] = [
    "Take a short break.",
    "Check your lighting.",
    "Reduce background noise.",
];

const FALLBACK_SUMMARY: &str = "Diagnostic engine encountered a network or processing error.";
const FALLBACK_TIPS: [&str; 3] = [
    "Try restarting the session.",
    "Ensure your API key is active.",
    "Check your internet connection.",
];

/// External natural-language summarization service
pub trait Summarizer: Send + Sync {
    /// Returns the raw model response text for these stats
    fn summarize(&self, stats: &SessionStats) -> Result<String, ComputeError>;
}

/// Render the summarization prompt for a session
pub fn build_prompt(stats: &SessionStats) -> String {
    let mut prompt = String::from(
        "Analyze these biometric and environmental session stats from a user's focus tracking app:\n",
    );
    let lines = [
        format!("Total Time: {} seconds", stats.total_time_seconds),
        format!("Engagement Score: {}%", stats.engagement_score),
        format!("Gaze Events (Attendance): {}", stats.total_looks),
        format!("Total Blinks: {}", stats.total_blinks),
        format!("Hand Fidgeting: {}", stats.hand_fidget_count),
        format!("Avg Noise Level: {}%", stats.avg_noise_level.round()),
        format!("Voice Activity: {}s", stats.voice_time_seconds),
        format!("Physical Impacts/Thumps: {}", stats.thump_count),
        format!("Head Tilt: {}°", stats.head_tilt_degrees.round()),
        format!("Brow Furrows (Stress): {}", stats.brow_furrow_count),
        format!("Ambient Brightness: {}", stats.avg_brightness.round()),
        format!(
            "System Stress (Hardware lag): {}%",
            stats.system_stress_score.round()
        ),
    ];
    for line in lines {
        prompt.push_str("- ");
        prompt.push_str(&line);
        prompt.push('\n');
    }
    if let Some(loc) = stats.location {
        prompt.push_str(&format!(
            "- Location: {:.4}, {:.4}\n",
            loc.latitude, loc.longitude
        ));
    }
    prompt.push_str(
        "\nProvide a concise behavioral verdict. Categorize engagement level as 'High', 'Medium', or 'Low'.\n\
         Give 3 actionable tactical tips to improve focus or comfort.\n\
         Respond with JSON: {\"summary\": string, \"tips\": [string], \"engagementLevel\": \"High\" | \"Medium\" | \"Low\"}\n",
    );
    prompt
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tips: Option<Vec<String>>,
    #[serde(default, alias = "engagementLevel")]
    engagement_level: Option<String>,
}

/// Parse a model response. Missing or empty fields take their defaults;
/// text that is not a JSON object is an error.
pub fn parse_analysis(text: &str) -> Result<AIAnalysis, ComputeError> {
    let body = strip_code_fence(text.trim());
    let raw: RawAnalysis = if body.is_empty() {
        RawAnalysis::default()
    } else {
        serde_json::from_str(body)?
    };

    let summary = raw
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let tips = raw
        .tips
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TIPS.iter().map(|t| t.to_string()).collect());
    let engagement_level = match raw.engagement_level.as_deref().map(str::trim) {
        Some("High") => EngagementLevel::High,
        Some("Low") => EngagementLevel::Low,
        _ => EngagementLevel::Medium,
    };

    Ok(AIAnalysis {
        summary,
        tips,
        engagement_level,
    })
}

/// Models often wrap JSON in a fenced block
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Fixed analysis substituted when the service fails
pub fn fallback_analysis() -> AIAnalysis {
    AIAnalysis {
        summary: FALLBACK_SUMMARY.to_string(),
        tips: FALLBACK_TIPS.iter().map(|t| t.to_string()).collect(),
        engagement_level: EngagementLevel::Medium,
    }
}

/// Result of one analysis request; always carries an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub analysis: AIAnalysis,
    /// True when `analysis` is the fallback payload
    pub fallback: bool,
    /// Dismissable message for the user, set on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl ReportOutcome {
    pub fn success(analysis: AIAnalysis) -> Self {
        Self {
            analysis,
            fallback: false,
            banner: None,
        }
    }

    /// The fallback outcome with its user-facing banner
    pub fn failed() -> Self {
        Self {
            analysis: fallback_analysis(),
            fallback: true,
            banner: Some(ANALYSIS_FAILED_BANNER.to_string()),
        }
    }
}

/// Holds the "is analyzing" flag for the duration of one request
struct AnalysisGuard {
    flag: Arc<AtomicBool>,
}

impl AnalysisGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ComputeError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ComputeError::AnalysisInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sends session stats to a [`Summarizer`], at most one request at a time
#[derive(Clone)]
pub struct ReportRequester {
    summarizer: Arc<dyn Summarizer>,
    is_analyzing: Arc<AtomicBool>,
}

impl std::fmt::Debug for ReportRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRequester")
            .field("is_analyzing", &self.is_analyzing())
            .finish()
    }
}

impl ReportRequester {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            summarizer,
            is_analyzing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing.load(Ordering::Acquire)
    }

    /// Run one analysis. Only a concurrent request is an error; service and
    /// parse failures resolve to the fallback outcome.
    pub fn request(&self, stats: &SessionStats) -> Result<ReportOutcome, ComputeError> {
        let _guard = AnalysisGuard::acquire(&self.is_analyzing)?;

        let outcome = match self
            .summarizer
            .summarize(stats)
            .and_then(|text| parse_analysis(&text))
        {
            Ok(analysis) => ReportOutcome::success(analysis),
            Err(e) => {
                log::error!("session analysis failed: {e}");
                ReportOutcome::failed()
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Summarizer returning a canned response, or failing when none is set
    #[derive(Debug, Default)]
    pub struct MockSummarizer {
        pub response: Option<String>,
        pub calls: Mutex<usize>,
    }

    impl MockSummarizer {
        pub fn replying(response: impl Into<String>) -> Self {
            Self {
                response: Some(response.into()),
                calls: Mutex::new(0),
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Summarizer for MockSummarizer {
        fn summarize(&self, _stats: &SessionStats) -> Result<String, ComputeError> {
            *self.calls.lock().unwrap() += 1;
            self.response
                .clone()
                .ok_or_else(|| ComputeError::AnalysisFailed("network unreachable".to_string()))
        }
    }
}
