use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("{0} text must not be empty")]
    Empty(Language),

    #[error("unsupported language code: {0}")]
    UnknownLanguage(String),
}

/// UI language of the app. Lesson content carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ja,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ja];

    /// Language used when nothing (or something unreadable) was persisted.
    pub const FALLBACK: Language = Language::En;

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
        }
    }

    /// Name of the language written in itself, for pickers.
    #[must_use]
    pub fn native_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ja => "日本語",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            other => Err(TextError::UnknownLanguage(other.to_string())),
        }
    }
}

/// A piece of content available in both Japanese and English.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualText {
    pub ja: String,
    pub en: String,
}

impl BilingualText {
    /// Build a text, rejecting blank halves.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` naming the blank language.
    pub fn new(ja: impl Into<String>, en: impl Into<String>) -> Result<Self, TextError> {
        let text = Self {
            ja: ja.into(),
            en: en.into(),
        };
        text.validate()?;
        Ok(text)
    }

    /// Checks that neither half is blank.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` naming the blank language.
    pub fn validate(&self) -> Result<(), TextError> {
        if self.ja.trim().is_empty() {
            return Err(TextError::Empty(Language::Ja));
        }
        if self.en.trim().is_empty() {
            return Err(TextError::Empty(Language::En));
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Ja => &self.ja,
        }
    }
}

/// A phrase shown on the lesson detail page with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhrasePair {
    pub ja: String,
    pub en: String,
}

impl PhrasePair {
    #[must_use]
    pub fn new(ja: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            ja: ja.into(),
            en: en.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
        assert_eq!("JA".parse::<Language>().unwrap(), Language::Ja);
    }

    #[test]
    fn unknown_language_is_rejected() {
        let err = "fr".parse::<Language>().unwrap_err();
        assert_eq!(err, TextError::UnknownLanguage("fr".into()));
    }

    #[test]
    fn bilingual_text_picks_language() {
        let text = BilingualText::new("こんにちは", "Hello").unwrap();
        assert_eq!(text.get(Language::Ja), "こんにちは");
        assert_eq!(text.get(Language::En), "Hello");
    }

    #[test]
    fn blank_half_is_rejected() {
        let err = BilingualText::new("  ", "Hello").unwrap_err();
        assert_eq!(err, TextError::Empty(Language::Ja));
    }
}
