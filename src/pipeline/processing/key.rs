use serde::{Deserialize, Serialize};

use crate::domain::EventKey;

/// Which fields identify a logical event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Two postings are one event only if title and description agree.
    #[default]
    TitleAndDescription,
    /// Postings with the same title are one event regardless of blurb.
    TitleOnly,
}

impl std::str::FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "title_and_description" => Ok(KeyStrategy::TitleAndDescription),
            "title_only" => Ok(KeyStrategy::TitleOnly),
            other => Err(format!("unknown key strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventKeyBuilder {
    strategy: KeyStrategy,
}

impl EventKeyBuilder {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self { strategy }
    }

    pub fn key(&self, title: &str, description: &str) -> EventKey {
        let value = match self.strategy {
            KeyStrategy::TitleAndDescription => {
                format!("{}_{}", normalize(title), normalize(description))
            }
            KeyStrategy::TitleOnly => normalize(title),
        };
        EventKey::from_normalized(value)
    }
}

/// Case-fold, trim, and collapse internal whitespace runs.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_case_and_whitespace() {
        let builder = EventKeyBuilder::default();
        let a = builder.key("  Murder Mystery   Dinner ", "A night of intrigue");
        let b = builder.key("murder mystery dinner", "a  night of\tintrigue ");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "murder mystery dinner_a night of intrigue");
    }

    #[test]
    fn test_description_distinguishes_events_by_default() {
        let builder = EventKeyBuilder::new(KeyStrategy::TitleAndDescription);
        assert_ne!(builder.key("Jazz Night", "Trio"), builder.key("Jazz Night", "Quartet"));
    }

    #[test]
    fn test_title_only_strategy() {
        let builder = EventKeyBuilder::new(KeyStrategy::TitleOnly);
        assert_eq!(builder.key("Jazz Night", "Trio"), builder.key("JAZZ NIGHT", "Quartet"));
        assert_eq!(builder.key("Jazz Night", "").as_str(), "jazz night");
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("title-only".parse::<KeyStrategy>().unwrap(), KeyStrategy::TitleOnly);
        assert_eq!(
            "title_and_description".parse::<KeyStrategy>().unwrap(),
            KeyStrategy::TitleAndDescription
        );
        assert!("venue".parse::<KeyStrategy>().is_err());
    }
}
