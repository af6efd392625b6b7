use std::fmt;
use std::str::FromStr;

use crate::util::paths::is_safe_name;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Serial(String);

impl Serial {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Serial {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("serial number is empty".to_string());
        }
        if !is_safe_name(s) {
            return Err("serial number must use only letters, digits, '.', '-', '_'".to_string());
        }
        Ok(Serial(s.to_string()))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    pub dry_run: bool,
    pub verbose: bool,
}

/// What an unhealthy disk report does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthPolicy {
    #[default]
    Warn,
    Block,
}

impl HealthPolicy {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(HealthPolicy::Warn),
            "block" => Ok(HealthPolicy::Block),
            _ => Err(format!(
                "invalid health policy {}; expected warn or block",
                value
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthPolicy::Warn => "warn",
            HealthPolicy::Block => "block",
        }
    }
}

/// Order of the two verification sampling phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePolicy {
    #[default]
    SampleThenFilter,
    FilterThenSample,
}

impl SamplePolicy {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sample-then-filter" => Ok(SamplePolicy::SampleThenFilter),
            "filter-then-sample" => Ok(SamplePolicy::FilterThenSample),
            _ => Err(format!(
                "invalid sample policy {}; expected sample-then-filter or filter-then-sample",
                value
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplePolicy::SampleThenFilter => "sample-then-filter",
            SamplePolicy::FilterThenSample => "filter-then-sample",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_rejects_empty_and_unsafe_values() {
        assert!("".parse::<Serial>().is_err());
        assert!("   ".parse::<Serial>().is_err());
        assert!("ABC/123".parse::<Serial>().is_err());
        assert_eq!("ABC123".parse::<Serial>().unwrap().as_str(), "ABC123");
    }

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!(HealthPolicy::parse("Block").unwrap(), HealthPolicy::Block);
        assert_eq!(
            SamplePolicy::parse("FILTER-then-sample").unwrap(),
            SamplePolicy::FilterThenSample
        );
        assert!(HealthPolicy::parse("ignore").is_err());
    }
}
