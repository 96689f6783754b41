use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Portal and search news articles
    #[default]
    News,
    /// Regulatory filings (DART)
    Disclosure,
    /// Community posts (Reddit)
    SocialPost,
}

impl ContentType {
    /// Derives the tag from a source identifier such as `DART(금융감독원)` or `reddit/r/korea`.
    pub fn from_source(source: &str) -> Self {
        let lower = source.to_lowercase();
        if lower.starts_with("dart") {
            ContentType::Disclosure
        } else if lower.starts_with("reddit") {
            ContentType::SocialPost
        } else {
            ContentType::News
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::News => write!(f, "news"),
            ContentType::Disclosure => write!(f, "disclosure"),
            ContentType::SocialPost => write!(f, "social_post"),
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "news" => Ok(ContentType::News),
            "disclosure" => Ok(ContentType::Disclosure),
            "social_post" | "social-post" | "social" => Ok(ContentType::SocialPost),
            _ => Err(format!("Unknown content type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source() {
        assert_eq!(ContentType::from_source("DART(금융감독원)"), ContentType::Disclosure);
        assert_eq!(ContentType::from_source("reddit/r/korea"), ContentType::SocialPost);
        assert_eq!(ContentType::from_source("네이버(한국경제)"), ContentType::News);
    }

    #[test]
    fn test_round_trip_display() {
        for ct in [ContentType::News, ContentType::Disclosure, ContentType::SocialPost] {
            assert_eq!(ct.to_string().parse::<ContentType>().unwrap(), ct);
        }
    }
}
