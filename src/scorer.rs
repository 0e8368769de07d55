//! Heuristic confidence scoring for discovered contact channels.
//!
//! Scores are integers in 0..=100. The target domain is passed explicitly so
//! concurrent crawls of different domains never share scoring state.

use crate::contact::clamp_confidence;
use crate::domain_utils::{email_domain, is_same_or_subdomain};

/// Multilingual legal vocabulary, matched case-insensitively.
pub const PRIVACY_KEYWORDS: &[&str] = &[
    "dpo",
    "privacy",
    "data protection",
    "gdpr",
    "datenschutz",
    "avg",
    "persoonlijke gegevens",
    "data protection officer",
    "data privacy",
    "dataprivacy",
    "gegevensbescherming",
];

const EMAIL_BASE: i32 = 10;
const DPO_BOOST: i32 = 50;
const PRIVACY_BOOST: i32 = 30;
const DATA_PROTECTION_BOOST: i32 = 25;
const NO_REPLY_PENALTY: i32 = 20;
const CONTEXT_KEYWORD_BOOST: i32 = 10;
const DOMAIN_ALIGNMENT_BOOST: i32 = 15;

const FORM_BASE: i32 = 20;
const FORM_KEYWORD_BOOST: i32 = 30;

/// True if `text` mentions any legal-vocabulary keyword.
pub fn contains_privacy_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    PRIVACY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Score an email address found while crawling `target_domain`.
pub fn score_email(email: &str, context: &str, target_domain: &str) -> u8 {
    let email = email.trim().to_lowercase();
    let local = email.rsplit_once('@').map(|(l, _)| l).unwrap_or(&email);

    let mut score = EMAIL_BASE;

    if local.contains("dpo") {
        score += DPO_BOOST;
    }
    if local.contains("privacy") {
        score += PRIVACY_BOOST;
    }
    if local.contains("dataprotection") || local.contains("data-protection") {
        score += DATA_PROTECTION_BOOST;
    }
    if local.starts_with("no-reply") || local.starts_with("noreply") {
        score -= NO_REPLY_PENALTY;
    }
    if contains_privacy_keyword(context) {
        score += CONTEXT_KEYWORD_BOOST;
    }
    if let Some(domain) = email_domain(&email) {
        if is_same_or_subdomain(&domain, target_domain) {
            score += DOMAIN_ALIGNMENT_BOOST;
        }
    }

    clamp_confidence(score)
}

/// Score a contact form from the text around it.
pub fn score_form(context: &str) -> u8 {
    let mut score = FORM_BASE;
    if contains_privacy_keyword(context) {
        score += FORM_KEYWORD_BOOST;
    }
    clamp_confidence(score)
}
