//! Collection formats for array-typed parameters.

use serde::{Deserialize, Serialize};

/// How an array travels as a single transport value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    /// Comma separated: `a,b,c`.
    #[default]
    Csv,
    /// Space separated: `a b c`.
    Ssv,
    /// Tab separated.
    Tsv,
    /// Pipe separated: `a|b|c`.
    Pipes,
    /// Repeated parameter: `?a=1&a=2`. The transport already yields an array.
    Multi,
}

impl CollectionFormat {
    /// Parses a `collectionFormat` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "csv" => Some(Self::Csv),
            "ssv" => Some(Self::Ssv),
            "tsv" => Some(Self::Tsv),
            "pipes" => Some(Self::Pipes),
            "multi" => Some(Self::Multi),
            _ => None,
        }
    }

    /// Document spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Ssv => "ssv",
            Self::Tsv => "tsv",
            Self::Pipes => "pipes",
            Self::Multi => "multi",
        }
    }

    /// Separator character, `None` for `multi`.
    #[must_use]
    pub const fn delimiter(self) -> Option<char> {
        match self {
            Self::Csv => Some(','),
            Self::Ssv => Some(' '),
            Self::Tsv => Some('\t'),
            Self::Pipes => Some('|'),
            Self::Multi => None,
        }
    }

    /// Splits a raw value. An empty input yields an empty array and `multi`
    /// wraps the raw value as a single element.
    ///
    /// ```rust
    /// use skyway_validate::CollectionFormat;
    ///
    /// assert_eq!(CollectionFormat::Pipes.split("a|b"), vec!["a", "b"]);
    /// assert!(CollectionFormat::Csv.split("").is_empty());
    /// ```
    #[must_use]
    pub fn split(self, raw: &str) -> Vec<String> {
        match self.delimiter() {
            Some(_) if raw.is_empty() => Vec::new(),
            Some(delimiter) => raw.split(delimiter).map(str::to_string).collect(),
            None => vec![raw.to_string()],
        }
    }
}

impl std::fmt::Display for CollectionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
