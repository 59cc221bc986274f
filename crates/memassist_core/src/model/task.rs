//! Reminder task model and creation-payload validation.
//!
//! # Responsibility
//! - Define the persisted task shape with its recurrence metadata.
//! - Validate and normalize raw creation payloads into [`NewTask`].
//!
//! # Invariants
//! - `repeat_type` is always one of [`RepeatKind`]'s four values.
//! - Weekday tags are a deduplicated subset of the seven canonical names,
//!   ordered Monday to Sunday.
//! - `reminder_time` is a wall-clock time with no date component.
//! - Recurrence fields are descriptive only; nothing evaluates due-ness.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TaskId = i64;

/// Input format for `reminder_time`.
pub const REMINDER_TIME_FORMAT: &str = "%H:%M";
/// Input format for `repeat_until`.
pub const REPEAT_UNTIL_FORMAT: &str = "%Y-%m-%d";

static REPEAT_DAY_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;]").expect("valid separator regex"));

/// Recurrence category of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatKind {
    /// One-time task.
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Exact, case-sensitive match against the stored names.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// Canonical weekday tag. Ordering follows the calendar week.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    /// Parses one token: trimmed, case-folded, full English name only.
    pub fn parse(token: &str) -> Option<Self> {
        let folded = token.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == folded.as_str())
    }
}

/// Weekday input as received from callers: one delimited string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatDays {
    /// `"monday,tuesday"`; `,` and `;` both separate entries.
    Delimited(String),
    List(Vec<String>),
}

impl RepeatDays {
    fn tokens(&self) -> Vec<&str> {
        match self {
            Self::Delimited(value) => REPEAT_DAY_SEPARATOR_RE.split(value).collect(),
            Self::List(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for RepeatDays {
    fn from(value: &str) -> Self {
        Self::Delimited(value.to_string())
    }
}

/// Normalizes weekday tokens into the stored tag set.
///
/// Rules:
/// - each token is trimmed and lower-cased;
/// - tokens that are not one of the seven weekday names are dropped silently;
/// - duplicates collapse; output is ordered Monday to Sunday.
pub fn parse_repeat_days<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Vec<Weekday> {
    tokens
        .into_iter()
        .filter_map(Weekday::parse)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Persisted reminder task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    /// Daily wall-clock reminder, serialized as `HH:MM`.
    #[serde(with = "clock_time")]
    pub reminder_time: Option<NaiveTime>,
    pub repeat_type: RepeatKind,
    /// Free-text annotation, stored verbatim.
    pub repeat_time: Option<String>,
    pub repeat_days: Vec<Weekday>,
    pub repeat_until: Option<NaiveDate>,
    pub is_completed: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Reserved for optimistic concurrency; no operation increments it.
    pub version: i64,
}

/// Raw task-creation payload, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub repeat_type: Option<String>,
    #[serde(default)]
    pub repeat_time: Option<String>,
    #[serde(default)]
    pub repeat_days: Option<RepeatDays>,
    #[serde(default)]
    pub repeat_until: Option<String>,
}

/// Validated task payload ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub reminder_time: Option<NaiveTime>,
    pub repeat_type: RepeatKind,
    pub repeat_time: Option<String>,
    pub repeat_days: Vec<Weekday>,
    pub repeat_until: Option<NaiveDate>,
}

/// Validation failures for task-creation payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    MissingName,
    InvalidReminderTime(String),
    InvalidRepeatUntil(String),
    InvalidRepeatType(String),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "task name is required"),
            Self::InvalidReminderTime(value) => write!(f, "invalid reminder time `{value}`"),
            Self::InvalidRepeatUntil(value) => write!(f, "invalid repeat-until date `{value}`"),
            Self::InvalidRepeatType(value) => write!(f, "invalid repeat type `{value}`"),
        }
    }
}

impl Error for TaskValidationError {}

impl CreateTaskInput {
    /// Validates the payload and produces the normalized insert shape.
    ///
    /// Empty `reminder_time` / `repeat_until` strings count as absent.
    /// An omitted `repeat_type` defaults to [`RepeatKind::None`].
    pub fn validate(&self) -> Result<NewTask, TaskValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TaskValidationError::MissingName);
        }

        let reminder_time = match non_empty(self.reminder_time.as_deref()) {
            Some(raw) => Some(
                NaiveTime::parse_from_str(raw, REMINDER_TIME_FORMAT)
                    .map_err(|_| TaskValidationError::InvalidReminderTime(raw.to_string()))?,
            ),
            None => None,
        };

        let repeat_until = match non_empty(self.repeat_until.as_deref()) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, REPEAT_UNTIL_FORMAT)
                    .map_err(|_| TaskValidationError::InvalidRepeatUntil(raw.to_string()))?,
            ),
            None => None,
        };

        let repeat_type = match self.repeat_type.as_deref() {
            Some(raw) => RepeatKind::parse(raw)
                .ok_or_else(|| TaskValidationError::InvalidRepeatType(raw.to_string()))?,
            None => RepeatKind::None,
        };

        let repeat_days = self
            .repeat_days
            .as_ref()
            .map(|days| parse_repeat_days(days.tokens()))
            .unwrap_or_default();

        Ok(NewTask {
            name: name.to_string(),
            description: self.description.clone(),
            reminder_time,
            repeat_type,
            repeat_time: self.repeat_time.clone(),
            repeat_days,
            repeat_until,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Serde adapter rendering `Option<NaiveTime>` as `HH:MM`.
mod clock_time {
    use super::REMINDER_TIME_FORMAT;
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => {
                serializer.serialize_some(&time.format(REMINDER_TIME_FORMAT).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| {
            NaiveTime::parse_from_str(&value, REMINDER_TIME_FORMAT)
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> CreateTaskInput {
        CreateTaskInput {
            name: name.to_string(),
            ..CreateTaskInput::default()
        }
    }

    #[test]
    fn repeat_days_drop_unknown_tokens_and_fold_case() {
        let days = parse_repeat_days(["monday", "Funday", "TUESDAY", "monday"]);
        assert_eq!(days, vec![Weekday::Monday, Weekday::Tuesday]);
    }

    #[test]
    fn repeat_days_are_ordered_by_calendar_week() {
        let days = RepeatDays::from("sunday; wednesday ,monday");
        assert_eq!(
            parse_repeat_days(days.tokens()),
            vec![Weekday::Monday, Weekday::Wednesday, Weekday::Sunday]
        );
    }

    #[test]
    fn abbreviations_are_not_weekdays() {
        assert_eq!(Weekday::parse("mon"), None);
        assert_eq!(Weekday::parse(""), None);
    }

    #[test]
    fn omitted_repeat_type_defaults_to_none() {
        let task = input("water plants").validate().unwrap();
        assert_eq!(task.repeat_type, RepeatKind::None);
        assert!(task.repeat_days.is_empty());
    }

    #[test]
    fn repeat_type_is_case_sensitive_and_closed() {
        let mut payload = input("call");
        payload.repeat_type = Some("biweekly".to_string());
        assert_eq!(
            payload.validate().unwrap_err(),
            TaskValidationError::InvalidRepeatType("biweekly".to_string())
        );

        payload.repeat_type = Some("Daily".to_string());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            input("   ").validate().unwrap_err(),
            TaskValidationError::MissingName
        );
    }

    #[test]
    fn reminder_time_keeps_wall_clock_only() {
        let mut payload = input("pills");
        payload.reminder_time = Some("08:30".to_string());
        let task = payload.validate().unwrap();
        assert_eq!(
            task.reminder_time,
            Some(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
        );

        payload.reminder_time = Some("25:00".to_string());
        assert!(matches!(
            payload.validate(),
            Err(TaskValidationError::InvalidReminderTime(_))
        ));
    }

    #[test]
    fn empty_optional_strings_count_as_absent() {
        let mut payload = input("pills");
        payload.reminder_time = Some(String::new());
        payload.repeat_until = Some("  ".to_string());
        let task = payload.validate().unwrap();
        assert_eq!(task.reminder_time, None);
        assert_eq!(task.repeat_until, None);
    }

    #[test]
    fn repeat_until_requires_calendar_date() {
        let mut payload = input("walk");
        payload.repeat_until = Some("2025-02-30".to_string());
        assert!(matches!(
            payload.validate(),
            Err(TaskValidationError::InvalidRepeatUntil(_))
        ));

        payload.repeat_until = Some("2025-03-01".to_string());
        assert_eq!(
            payload.validate().unwrap().repeat_until,
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn repeat_days_accept_list_payloads() {
        let payload: CreateTaskInput = serde_json::from_value(serde_json::json!({
            "name": "gym",
            "repeat_type": "weekly",
            "repeat_days": ["Friday", "friday", "someday"]
        }))
        .unwrap();
        let task = payload.validate().unwrap();
        assert_eq!(task.repeat_days, vec![Weekday::Friday]);
    }

    #[test]
    fn task_serializes_reminder_as_hour_minute() {
        let task = Task {
            id: 1,
            name: "pills".to_string(),
            description: None,
            reminder_time: NaiveTime::from_hms_opt(7, 5, 0),
            repeat_type: RepeatKind::Daily,
            repeat_time: None,
            repeat_days: vec![Weekday::Monday],
            repeat_until: None,
            is_completed: false,
            created_at: 0,
            version: 1,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["reminder_time"], "07:05");
        assert_eq!(json["repeat_type"], "daily");
        assert_eq!(json["repeat_days"][0], "monday");
    }
}
