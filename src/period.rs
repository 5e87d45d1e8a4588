use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Academic period an assessment or a rubric term belongs to.
///
/// Parsing is forgiving: case and surrounding whitespace are ignored and the
/// synonym `finals` maps to [`AcademicPeriod::Final`]. Serialization always
/// writes the canonical lowercase form (`"midterm"` / `"final"`).
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AcademicPeriod {
    Midterm,
    Final,
}

impl AcademicPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicPeriod::Midterm => "midterm",
            AcademicPeriod::Final => "final",
        }
    }
}

impl fmt::Display for AcademicPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcademicPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "midterm" => Ok(AcademicPeriod::Midterm),
            "final" | "finals" => Ok(AcademicPeriod::Final),
            other => Err(format!("unknown academic period: '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for AcademicPeriod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalizes a free-text rubric component name for matching.
pub(crate) fn normalize_component_name(name: &str) -> String {
    name.trim().to_lowercase()
}
