//! Run inputs handed to the pipeline entry point.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Topic used when `crew.toml` does not override it.
pub const DEFAULT_TOPIC: &str = "AI LLMs";

/// Parameter map for one local pipeline execution.
///
/// Field order is the serialized key order: `topic`, `current_year`, `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInputs {
    pub topic: String,
    /// Four-digit year as a decimal string.
    pub current_year: String,
    /// Calendar date formatted `YYYY-MM-DD`.
    pub date: String,
}

/// Build run inputs for today's local date.
pub fn build_inputs(topic: &str) -> RunInputs {
    build_inputs_at(topic, Local::now().date_naive())
}

/// Build run inputs for an explicit date.
pub fn build_inputs_at(topic: &str, date: NaiveDate) -> RunInputs {
    RunInputs {
        topic: topic.to_string(),
        current_year: format!("{:04}", date.year()),
        date: date.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_for_fixed_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).expect("date");
        let inputs = build_inputs_at(DEFAULT_TOPIC, date);
        assert_eq!(inputs.topic, "AI LLMs");
        assert_eq!(inputs.current_year, "2025");
        assert_eq!(inputs.date, "2025-03-07");
    }

    #[test]
    fn inputs_for_today_match_clock() {
        let before = Local::now().date_naive();
        let inputs = build_inputs(DEFAULT_TOPIC);
        let after = Local::now().date_naive();

        let date = NaiveDate::parse_from_str(&inputs.date, "%Y-%m-%d").expect("parse date");
        assert!(date == before || date == after);
        assert_eq!(inputs.current_year.len(), 4);
        assert_eq!(inputs.current_year, date.year().to_string());

        let bytes = inputs.date.as_bytes();
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[7], b'-');
    }

    #[test]
    fn serializes_keys_in_order() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).expect("date");
        let json = serde_json::to_string(&build_inputs_at("rust", date)).expect("serialize");
        assert_eq!(
            json,
            r#"{"topic":"rust","current_year":"2024","date":"2024-12-31"}"#
        );
    }
}
