//! Contact record data model
//!
//! A `ContactRecord` is the persisted, one-per-domain answer to "where do I
//! send a privacy request for this company". The destination is a closed
//! tagged variant so an email or form always carries its value and a
//! `None` contact never does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamp any intermediate score into the 0-100 confidence range.
pub fn clamp_confidence(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

/// Kind of channel, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Email,
    Form,
    None,
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactType::Email => write!(f, "email"),
            ContactType::Form => write!(f, "form"),
            ContactType::None => write!(f, "none"),
        }
    }
}

/// Destination for a data-subject request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "contact_type", content = "value", rename_all = "lowercase")]
pub enum Contact {
    /// Email address
    Email(String),
    /// Absolute URL a contact form submits to
    Form(String),
    None,
}

impl Contact {
    pub fn contact_type(&self) -> ContactType {
        match self {
            Contact::Email(_) => ContactType::Email,
            Contact::Form(_) => ContactType::Form,
            Contact::None => ContactType::None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Contact::Email(v) | Contact::Form(v) => Some(v),
            Contact::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Contact::None)
    }
}

/// Finding kinds the extractor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Email,
    Form,
}

/// One candidate channel observed on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "contact_type")]
    pub kind: FindingKind,
    pub value: String,
    pub confidence: u8,
    /// Short text snippet the score was computed from
    pub context: String,
}

impl Finding {
    pub fn email(value: impl Into<String>, confidence: u8, context: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::Email,
            value: value.into(),
            confidence: confidence.min(100),
            context: context.into(),
        }
    }

    pub fn form(value: impl Into<String>, confidence: u8, context: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::Form,
            value: value.into(),
            confidence: confidence.min(100),
            context: context.into(),
        }
    }

    pub fn to_contact(&self) -> Contact {
        match self.kind {
            FindingKind::Email => Contact::Email(self.value.clone()),
            FindingKind::Form => Contact::Form(self.value.clone()),
        }
    }
}

/// Audit payload recorded with every crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlMeta {
    /// All findings that survived filtering, in discovery order
    #[serde(default)]
    pub tried: Vec<Finding>,
    /// Every URL the crawl visited, including ones whose fetch failed
    #[serde(default)]
    pub pages_crawled: Vec<String>,
}

/// Outcome of one crawl, before it is merged into the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub contact: Contact,
    pub confidence: u8,
    pub meta: CrawlMeta,
}

impl ProbeResult {
    /// Nothing qualifying was found.
    pub fn none(meta: CrawlMeta) -> Self {
        Self {
            contact: Contact::None,
            confidence: 0,
            meta,
        }
    }

    pub fn from_finding(finding: &Finding, meta: CrawlMeta) -> Self {
        Self {
            contact: finding.to_contact(),
            confidence: finding.confidence.min(100),
            meta,
        }
    }

    pub fn contact_type(&self) -> ContactType {
        self.contact.contact_type()
    }
}

/// Persisted per-domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub domain: String,
    /// Stored as top-level `contact_type` / `value` fields
    #[serde(flatten)]
    pub contact: Contact,
    pub confidence: u8,
    /// Time of the last crawl attempt
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    /// Bounce state is owned by the bounce-notification feed and only carried here
    #[serde(default)]
    pub last_bounce_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bounce_reason: Option<String>,
    #[serde(default)]
    pub bounce_count: u32,
    #[serde(default)]
    pub meta: CrawlMeta,
}

impl ContactRecord {
    /// Build a record, enforcing `None` <=> confidence 0 and clamping to 100.
    pub fn new(
        domain: impl Into<String>,
        contact: Contact,
        confidence: u8,
        checked_at: Option<DateTime<Utc>>,
    ) -> Self {
        let confidence = if contact.is_none() { 0 } else { confidence.min(100) };
        Self {
            domain: domain.into(),
            contact,
            confidence,
            checked_at,
            last_bounce_at: None,
            bounce_reason: None,
            bounce_count: 0,
            meta: CrawlMeta::default(),
        }
    }

    pub fn contact_type(&self) -> ContactType {
        self.contact.contact_type()
    }

    pub fn value(&self) -> Option<&str> {
        self.contact.value()
    }

    /// Email at or above `min_confidence`.
    pub fn is_good_email(&self, min_confidence: u8) -> bool {
        matches!(self.contact, Contact::Email(_)) && self.confidence >= min_confidence
    }

    /// Copy bounce bookkeeping from `prior`, leaving everything else alone.
    pub fn carry_bounce_state(&mut self, prior: &ContactRecord) {
        self.last_bounce_at = prior.last_bounce_at;
        self.bounce_reason = prior.bounce_reason.clone();
        self.bounce_count = prior.bounce_count;
    }
}
