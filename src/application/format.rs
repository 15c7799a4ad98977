//! Result formatter: clean and debug presentations of a `DpResult`.
//!
//! This is the only place that decides which fields leave the process.
//! Clean output carries the noisy count and nothing that could narrow down
//! an individual IP's contribution.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Contributor, DpResult};

/// Public view of a query: date, epsilon and the noisy count only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanView {
    pub date: NaiveDate,
    pub epsilon: f64,
    pub noisy_count: u64,
}

/// Operator view of a query, including the unprotected diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugView {
    pub date: NaiveDate,
    pub epsilon: f64,
    pub noisy_count: u64,
    pub true_count: u64,
    pub sensitivity: u64,
    /// Drawn noise, rounded to 2 decimals
    pub noise: f64,
    /// Laplace scale, rounded to 2 decimals
    pub noise_scale: f64,
    pub num_ips: usize,
    pub top_attackers: Vec<Contributor>,
    pub interpretation: String,
}

/// Presentation handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Presentation {
    Clean(CleanView),
    Debug(DebugView),
}

impl Presentation {
    /// The released (noisy) count, present in both modes.
    #[must_use]
    pub fn noisy_count(&self) -> u64 {
        match self {
            Self::Clean(view) => view.noisy_count,
            Self::Debug(view) => view.noisy_count,
        }
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug(_))
    }
}

/// Shape `result` for the caller.
#[must_use]
pub fn format(result: &DpResult, debug: bool) -> Presentation {
    if !debug {
        return Presentation::Clean(CleanView {
            date: result.date,
            epsilon: result.epsilon,
            noisy_count: result.noisy_count,
        });
    }

    Presentation::Debug(DebugView {
        date: result.date,
        epsilon: result.epsilon,
        noisy_count: result.noisy_count,
        true_count: result.true_count,
        sensitivity: result.sensitivity,
        noise: round2(result.noise_value),
        noise_scale: round2(result.noise_scale),
        num_ips: result.num_ips,
        top_attackers: result.top_contributors.clone(),
        interpretation: interpret(result),
    })
}

fn round2(x: f64) -> f64 {
    let scaled = x * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        x
    }
}

/// Human-readable reading of the noise relative to the sensitivity.
fn interpret(result: &DpResult) -> String {
    if result.sensitivity == 0 {
        return "No attacks recorded for this day: nothing to protect, so no noise was added."
            .to_string();
    }

    let relative_scale = result.noise_scale / result.sensitivity as f64;
    let magnitude = if relative_scale >= 2.0 {
        "well above"
    } else if relative_scale >= 0.5 {
        "comparable to"
    } else {
        "well below"
    };

    format!(
        "Noise scale {:.2} is {magnitude} the largest single contributor ({} attacks), \
         bounding how much any one IP's presence can be distinguished (epsilon = {}). \
         This draw shifted the total by {:+.0}.",
        result.noise_scale, result.sensitivity, result.epsilon, result.noise_value
    )
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean(view) => {
                writeln!(f, "Date:         {}", view.date)?;
                writeln!(f, "Epsilon:      {}", view.epsilon)?;
                write!(f, "Attacks (DP): {}", view.noisy_count)
            }
            Self::Debug(view) => {
                writeln!(f, "Date:         {}", view.date)?;
                writeln!(f, "Epsilon:      {}", view.epsilon)?;
                writeln!(f, "Attacks (DP): {}", view.noisy_count)?;
                writeln!(f, "True count:   {}", view.true_count)?;
                writeln!(f, "Sensitivity:  {}", view.sensitivity)?;
                writeln!(f, "Noise:        {:.2}", view.noise)?;
                writeln!(f, "Noise scale:  {:.2}", view.noise_scale)?;
                writeln!(f, "Source IPs:   {}", view.num_ips)?;
                if !view.top_attackers.is_empty() {
                    writeln!(f, "Top attackers:")?;
                    for (rank, c) in view.top_attackers.iter().enumerate() {
                        writeln!(f, "  {}. {}: {} attacks", rank + 1, c.ip, c.count)?;
                    }
                }
                write!(f, "{}", view.interpretation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> DpResult {
        DpResult {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date"),
            epsilon: 1.0,
            sensitivity: 500,
            noisy_count: 812,
            true_count: 700,
            noise_value: 112.3456,
            noise_scale: 500.0,
            num_ips: 3,
            top_contributors: vec![
                Contributor { ip: "203.0.113.5".to_string(), count: 500 },
                Contributor { ip: "198.51.100.7".to_string(), count: 100 },
            ],
        }
    }

    #[test]
    fn test_clean_json_has_only_public_fields() {
        let json = serde_json::to_value(format(&sample_result(), false)).expect("serializes");
        let obj = json.as_object().expect("object");

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["date", "epsilon", "noisy_count"]);
        assert_eq!(json["date"], "2025-01-15");
        assert_eq!(json["noisy_count"], 812);
    }

    #[test]
    fn test_clean_text_leaks_nothing() {
        let text = format(&sample_result(), false).to_string();
        assert!(text.contains("812"));
        assert!(!text.contains("700"));
        assert!(!text.contains("203.0.113.5"));
        assert!(!text.contains("500"));
    }

    #[test]
    fn test_debug_json_fields() {
        let json = serde_json::to_value(format(&sample_result(), true)).expect("serializes");

        assert_eq!(json["true_count"], 700);
        assert_eq!(json["sensitivity"], 500);
        assert_eq!(json["noise"], 112.35);
        assert_eq!(json["noise_scale"], 500.0);
        assert_eq!(json["num_ips"], 3);
        assert_eq!(json["top_attackers"][0]["ip"], "203.0.113.5");
        assert_eq!(json["top_attackers"][0]["count"], 500);
        assert!(json["interpretation"]
            .as_str()
            .expect("string")
            .contains("comparable to the largest single contributor"));
    }

    #[test]
    fn test_interpretation_for_empty_day() {
        let result = DpResult {
            sensitivity: 0,
            noisy_count: 0,
            true_count: 0,
            noise_value: 0.0,
            noise_scale: 0.0,
            num_ips: 0,
            top_contributors: Vec::new(),
            ..sample_result()
        };
        match format(&result, true) {
            Presentation::Debug(view) => {
                assert!(view.interpretation.contains("nothing to protect"));
            }
            Presentation::Clean(_) => panic!("expected debug view"),
        }
    }

    #[test]
    fn test_interpretation_tracks_epsilon() {
        let strong = DpResult {
            epsilon: 0.1,
            noise_scale: 5_000.0,
            ..sample_result()
        };
        assert!(interpret(&strong).contains("well above"));

        let weak = DpResult {
            epsilon: 5.0,
            noise_scale: 100.0,
            ..sample_result()
        };
        assert!(interpret(&weak).contains("well below"));
    }

    #[test]
    fn test_round2_keeps_huge_values_finite() {
        assert_eq!(round2(112.3456), 112.35);
        let huge = f64::MAX / 64.0;
        assert_eq!(round2(huge), huge);
    }

    #[test]
    fn test_mode_accessors() {
        let clean = format(&sample_result(), false);
        assert!(!clean.is_debug());
        assert_eq!(clean.noisy_count(), 812);
        assert!(format(&sample_result(), true).is_debug());
    }
}
