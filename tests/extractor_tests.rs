mod common;

use common::fixtures::{html_page, load_fixture};
use dpofinder::contact::FindingKind;
use dpofinder::extractor::{Extractor, ParseError};
use dpofinder::fetcher::FetchedPage;
use url::Url;

fn base(u: &str) -> Url {
    Url::parse(u).unwrap()
}

#[test]
fn test_privacy_policy_findings() {
    let html = load_fixture("privacy_policy.html");
    let extraction = Extractor::default().extract(&html, &base("https://example.com/privacy"), "example.com");

    let emails: Vec<(&str, u8)> = extraction
        .findings
        .iter()
        .filter(|f| f.kind == FindingKind::Email)
        .map(|f| (f.value.as_str(), f.confidence))
        .collect();

    // Mailto first, then inline addresses in document order
    assert_eq!(
        emails,
        vec![
            ("dpo@example.com", 85),
            ("support@example.com", 35),
            ("press@agency-partner.net", 20),
            ("noreply@example.com", 15),
        ]
    );
    assert!(extraction.findings.iter().all(|f| f.kind == FindingKind::Email));
}

#[test]
fn test_mailto_context_is_anchor_text() {
    let html = load_fixture("privacy_policy.html");
    let extraction = Extractor::default().extract(&html, &base("https://example.com/privacy"), "example.com");

    let dpo = &extraction.findings[0];
    assert_eq!(dpo.context, "DPO@Example.com");
}

#[test]
fn test_inline_body_context_outscores_bare_mailto_anchor() {
    let html = r#"<h1>Privacy Policy</h1><p>Write to <a href="mailto:privacy@example.com">us</a> or privacy@example.com</p>"#;
    let extraction = Extractor::default().extract(html, &base("https://example.com/"), "example.com");

    assert_eq!(extraction.findings.len(), 1);
    let finding = &extraction.findings[0];
    assert_eq!(finding.value, "privacy@example.com");
    // 10 base + 30 privacy + 10 body keyword + 15 alignment; the anchor alone gives 55
    assert_eq!(finding.confidence, 65);
    assert!(finding.context.starts_with("Privacy Policy"));
}

#[test]
fn test_mailto_keeps_its_score_when_inline_is_weaker() {
    let html = html_page(
        r#"<p>Questions? hello@example.com</p><p><a href="mailto:hello@example.com">Data protection questions</a></p>"#,
    );
    let extraction = Extractor::default().extract(&html, &base("https://example.com/"), "example.com");

    assert_eq!(extraction.findings.len(), 1);
    // Mailto context has the keyword, the body prefix does too: tie keeps the mailto
    assert_eq!(extraction.findings[0].confidence, 35);
    assert_eq!(extraction.findings[0].context, "Data protection questions");
}

#[test]
fn test_script_emails_are_ignored() {
    let html = load_fixture("privacy_policy.html");
    let extraction = Extractor::default().extract(&html, &base("https://example.com/privacy"), "example.com");
    assert!(!extraction.findings.iter().any(|f| f.value.contains("tracking")));
}

#[test]
fn test_inline_context_is_capped_body_prefix() {
    let long_text = "privacy ".repeat(200);
    let html = html_page(&format!("<p>{}</p><p>reach us at hello@example.com</p>", long_text));
    let extraction = Extractor::default().extract(&html, &base("https://example.com/"), "example.com");

    assert_eq!(extraction.findings.len(), 1);
    assert_eq!(extraction.findings[0].context.chars().count(), 500);
    assert!(extraction.findings[0].context.starts_with("privacy privacy"));
}

#[test]
fn test_next_links_from_privacy_policy() {
    let html = load_fixture("privacy_policy.html");
    let extraction = Extractor::default().extract(&html, &base("https://example.com/privacy"), "example.com");

    let links: Vec<String> = extraction.next_links.iter().map(|u| u.to_string()).collect();
    assert_eq!(
        links,
        vec![
            "https://example.com/legal/cookies",
            "https://example.com/privacy",
            "https://example.com/datenschutz",
            "https://example.com/impressum",
        ]
    );
}

#[test]
fn test_off_host_links_are_candidates() {
    let html = html_page(r#"<a href="https://trust.vendor.io/privacy">Privacy center</a>"#);
    let extraction = Extractor::default().extract(&html, &base("https://example.com/"), "example.com");
    assert_eq!(extraction.next_links.len(), 1);
    assert_eq!(extraction.next_links[0].host_str(), Some("trust.vendor.io"));
}

#[test]
fn test_contact_form_scoring_and_target() {
    let html = load_fixture("contact_form.html");
    let extraction = Extractor::default().extract(&html, &base("https://example.com/contact"), "example.com");

    assert_eq!(extraction.findings.len(), 1, "sales form should score below the form threshold");
    let form = &extraction.findings[0];
    assert_eq!(form.kind, FindingKind::Form);
    assert_eq!(form.value, "https://example.com/privacy/request");
    assert_eq!(form.confidence, 50);
    assert!(form.context.starts_with("Privacy requests"));
}

#[test]
fn test_form_without_action_targets_page() {
    let html = html_page(r#"<div>GDPR request<form><input name="q"></form></div>"#);
    let extraction = Extractor::default().extract(&html, &base("https://example.com/gdpr"), "example.com");

    assert_eq!(extraction.findings.len(), 1);
    assert_eq!(extraction.findings[0].value, "https://example.com/gdpr");
}

#[test]
fn test_form_threshold_is_configurable() {
    let html = load_fixture("contact_form.html");
    let extractor = Extractor::new(15, 20, r"(?i)privacy").unwrap();
    let extraction = extractor.extract(&html, &base("https://example.com/contact"), "example.com");

    let forms: Vec<&str> = extraction.findings.iter().map(|f| f.value.as_str()).collect();
    assert_eq!(forms, vec!["https://example.com/sales/lead", "https://example.com/privacy/request"]);
}

#[test]
fn test_german_page() {
    let html = load_fixture("datenschutz.html");
    let extraction = Extractor::default().extract(&html, &base("https://beispiel.de/datenschutz"), "beispiel.de");

    assert_eq!(extraction.findings.len(), 1);
    assert_eq!(extraction.findings[0].value, "datenschutz@beispiel.de");
    assert_eq!(extraction.findings[0].confidence, 35);
}

#[test]
fn test_extract_page_rejects_binary_content() {
    let page = FetchedPage {
        url: base("https://example.com/privacy.pdf"),
        content_type: Some("application/pdf".to_string()),
        body: "mailto:dpo@example.com".to_string(),
    };

    let err = Extractor::default().extract_page(&page, "example.com").unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedContentType { .. }));
}

#[test]
fn test_extract_page_accepts_missing_content_type() {
    let page = FetchedPage {
        url: base("https://example.com/"),
        content_type: None,
        body: html_page(r#"<a href="mailto:privacy@example.com">Privacy team</a>"#),
    };

    let extraction = Extractor::default().extract_page(&page, "example.com").unwrap();
    assert_eq!(extraction.findings.len(), 1);
    // 10 base + 30 privacy + 10 context + 15 alignment
    assert_eq!(extraction.findings[0].confidence, 65);
}

#[test]
fn test_malformed_markup_does_not_panic() {
    let html = "<html><body><a href='mailto:dpo@example.com'>dpo<div><form action=::::><p>unclosed";
    let extraction = Extractor::default().extract(html, &base("https://example.com/"), "example.com");
    assert!(extraction.findings.iter().any(|f| f.value == "dpo@example.com"));
}
