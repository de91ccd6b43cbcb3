use crate::error::ChronoError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The supervised task families a model can be benchmarked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
    TimeToEvent,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::Classification,
        TaskType::Regression,
        TaskType::TimeToEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
            TaskType::TimeToEvent => "time_to_event",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ChronoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ChronoError::invalid_input(format!("unknown task type {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for task in TaskType::ALL {
            assert_eq!(task.as_str().parse::<TaskType>().unwrap(), task);
        }
        assert!("survival".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TaskType::TimeToEvent).unwrap();
        assert_eq!(json, "\"time_to_event\"");
    }
}
