//! Language tags for documents.

use serde::{Deserialize, Serialize};

/// Language of a document, used to select language-specific annotators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English language
    #[default]
    English,
    /// German language
    German,
    /// French language
    French,
    /// Spanish language
    Spanish,
    /// Portuguese language
    Portuguese,
    /// Russian language
    Russian,
    /// Chinese language (Simplified/Traditional)
    Chinese,
    /// Japanese language
    Japanese,
    /// Korean language
    Korean,
    /// Arabic language
    Arabic,
    /// Hebrew language
    Hebrew,
    /// Other/unknown language
    Other,
}

impl Language {
    /// Returns true if this is a CJK (Chinese, Japanese, Korean) language.
    #[must_use]
    pub fn is_cjk(&self) -> bool {
        matches!(
            self,
            Language::Chinese | Language::Japanese | Language::Korean
        )
    }

    /// Returns true if this is a right-to-left language (Arabic, Hebrew).
    #[must_use]
    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Arabic | Language::Hebrew)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::English => "english",
            Language::German => "german",
            Language::French => "french",
            Language::Spanish => "spanish",
            Language::Portuguese => "portuguese",
            Language::Russian => "russian",
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::Arabic => "arabic",
            Language::Hebrew => "hebrew",
            Language::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Simple heuristic language detection based on Unicode scripts.
///
/// Counts characters per script and returns the dominant one; Latin text
/// falls back to English. Intended for routing documents to annotators, not
/// for linguistic classification.
#[must_use]
pub fn detect_language(text: &str) -> Language {
    let mut cjk = 0usize;
    let mut kana = 0usize;
    let mut hangul = 0usize;
    let mut arabic = 0usize;
    let mut hebrew = 0usize;
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    let mut total = 0usize;

    for c in text.chars() {
        if !c.is_alphabetic() {
            continue;
        }
        total += 1;
        match c {
            '\u{4e00}'..='\u{9fff}' => cjk += 1,
            '\u{3040}'..='\u{30ff}' => kana += 1,
            '\u{ac00}'..='\u{d7af}' => hangul += 1,
            '\u{0600}'..='\u{06ff}' => arabic += 1,
            '\u{0590}'..='\u{05ff}' => hebrew += 1,
            '\u{0400}'..='\u{04ff}' => cyrillic += 1,
            c if c.is_ascii_alphabetic() => latin += 1,
            _ => {}
        }
    }

    if total == 0 {
        return Language::Other;
    }
    let half = total / 2;
    if kana > 0 && kana + cjk > half {
        Language::Japanese
    } else if cjk > half {
        Language::Chinese
    } else if hangul > half {
        Language::Korean
    } else if arabic > half {
        Language::Arabic
    } else if hebrew > half {
        Language::Hebrew
    } else if cyrillic > half {
        Language::Russian
    } else if latin > 0 {
        Language::English
    } else {
        Language::Other
    }
}
