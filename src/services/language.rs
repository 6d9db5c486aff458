// Language Detection Service
// Classifies contract text by the share of Devanagari characters and
// provides the clause vocabulary for each language.

use crate::models::ContractLanguage;
use serde::{Deserialize, Serialize};

/// The ten clause categories every analysis asks for.
pub const ENGLISH_CLAUSES: [&str; 10] = [
    "Term",
    "Termination",
    "Indemnity",
    "Limitation of Liability",
    "Confidentiality",
    "IP Ownership",
    "Governing Law",
    "Data Privacy",
    "Insurance",
    "Payment Terms",
];

/// Hindi names for [`ENGLISH_CLAUSES`], index-aligned.
pub const HINDI_CLAUSES: [&str; 10] = [
    "अवधि",
    "समाप्ति",
    "क्षतिपूर्ति",
    "दायित्व की सीमा",
    "गोपनीयता",
    "बौद्धिक संपदा स्वामित्व",
    "शासी कानून",
    "डेटा गोपनीयता",
    "बीमा",
    "भुगतान शर्तें",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageThresholds {
    /// Devanagari ratio strictly above this is Hindi.
    #[serde(default = "default_hindi_ratio")]
    pub hindi: f64,
    /// Devanagari ratio strictly above this (and not Hindi) is mixed.
    #[serde(default = "default_mixed_ratio")]
    pub mixed: f64,
}

impl Default for LanguageThresholds {
    fn default() -> Self {
        Self {
            hindi: default_hindi_ratio(),
            mixed: default_mixed_ratio(),
        }
    }
}

fn default_hindi_ratio() -> f64 { 0.30 }
fn default_mixed_ratio() -> f64 { 0.10 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseVocabulary {
    #[serde(default = "default_english")]
    pub english: Vec<String>,
    #[serde(default = "default_hindi")]
    pub hindi: Vec<String>,
}

impl Default for ClauseVocabulary {
    fn default() -> Self {
        Self {
            english: default_english(),
            hindi: default_hindi(),
        }
    }
}

impl ClauseVocabulary {
    /// Hindi documents get the Hindi names; mixed and English documents use
    /// the English names so clause text can still be quoted verbatim.
    pub fn for_language(&self, language: ContractLanguage) -> &[String] {
        match language {
            ContractLanguage::Hindi => &self.hindi,
            ContractLanguage::English | ContractLanguage::Mixed => &self.english,
        }
    }
}

fn default_english() -> Vec<String> {
    ENGLISH_CLAUSES.iter().map(|s| s.to_string()).collect()
}

fn default_hindi() -> Vec<String> {
    HINDI_CLAUSES.iter().map(|s| s.to_string()).collect()
}

#[inline]
pub fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

/// Share of non-whitespace characters that fall in the Devanagari block.
pub fn devanagari_ratio(text: &str) -> f64 {
    let mut devanagari = 0usize;
    let mut total = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_devanagari(c) {
            devanagari += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    devanagari as f64 / total as f64
}

pub fn detect_language(text: &str) -> ContractLanguage {
    detect_language_with(text, &LanguageThresholds::default())
}

pub fn detect_language_with(text: &str, thresholds: &LanguageThresholds) -> ContractLanguage {
    if text.is_empty() {
        return ContractLanguage::English;
    }

    let ratio = devanagari_ratio(text);
    if ratio > thresholds.hindi {
        ContractLanguage::Hindi
    } else if ratio > thresholds.mixed {
        ContractLanguage::Mixed
    } else {
        ContractLanguage::English
    }
}
