//! Datasheet decoding and specification extraction
//!
//! Decodes a downloaded datasheet document into text and evaluates the
//! manufacturer's rule table over it. Rules are independent and best-effort:
//! a non-matching field is simply absent from the output map, because
//! datasheet layouts vary across product generations. Only a document that
//! cannot be decoded into text at all is an error.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::product::{Brand, SpecValue, TechnicalSpecMap};
use crate::infrastructure::spec_rules::{DatasheetRuleSets, ExtractionRule, SpecRule};
use crate::infrastructure::sync_error::{SyncError, SyncResult};

/// Evaluates per-manufacturer rule tables against datasheet documents.
pub struct SpecExtractor {
    rule_sets: DatasheetRuleSets,
}

impl SpecExtractor {
    pub fn new(rule_sets: DatasheetRuleSets) -> Self {
        Self { rule_sets }
    }

    /// Decode a datasheet document and extract the brand's spec fields.
    pub fn extract(&self, brand: Brand, document: &[u8]) -> SyncResult<TechnicalSpecMap> {
        let text = decode_document(document)?;
        Ok(self.extract_from_text(brand, &text))
    }

    /// Evaluate the brand's rule table over already-decoded text.
    pub fn extract_from_text(&self, brand: Brand, text: &str) -> TechnicalSpecMap {
        let rule_set = self.rule_sets.for_brand(brand);
        let text_lower = text.to_lowercase();
        let mut specs = TechnicalSpecMap::new();

        for rule in &rule_set.rules {
            apply_rule(rule, text, &text_lower, &mut specs);
        }

        debug!(
            brand = %brand,
            fields = specs.len(),
            "datasheet extraction finished"
        );
        specs
    }
}

/// Decode raw document bytes into text. PDF documents are recognized by
/// their magic header; anything else must already be valid UTF-8 text.
pub fn decode_document(document: &[u8]) -> SyncResult<String> {
    if document.starts_with(b"%PDF") {
        return pdf_extract::extract_text_from_mem(document)
            .map_err(|e| SyncError::parse_failure("pdf", e.to_string()));
    }

    match std::str::from_utf8(document) {
        Ok(text) => Ok(text.to_string()),
        Err(e) => Err(SyncError::parse_failure(
            "text",
            format!("document is neither PDF nor UTF-8 text: {e}"),
        )),
    }
}

fn apply_rule(rule: &SpecRule, text: &str, text_lower: &str, specs: &mut TechnicalSpecMap) {
    match &rule.rule {
        ExtractionRule::CaptureAfterLabel { pattern } => {
            let Some(re) = compile(pattern, &rule.field) else {
                return;
            };
            if let Some(caps) = re.captures(text) {
                let value = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string());
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    specs.insert(rule.field.clone(), SpecValue::Text(value));
                }
            }
        }
        ExtractionRule::CollectUnique { pattern } => {
            let Some(re) = compile(pattern, &rule.field) else {
                return;
            };
            let matches = collect_matches(&re, text, true);
            if !matches.is_empty() {
                specs.insert(rule.field.clone(), SpecValue::List(matches));
            }
        }
        ExtractionRule::CollectAll { pattern } => {
            let Some(re) = compile(pattern, &rule.field) else {
                return;
            };
            let matches = collect_matches(&re, text, false);
            if !matches.is_empty() {
                specs.insert(rule.field.clone(), SpecValue::List(matches));
            }
        }
        ExtractionRule::ContainsText { needle, value } => {
            if text_lower.contains(&needle.to_lowercase()) {
                specs.insert(rule.field.clone(), SpecValue::Text(value.clone()));
            }
        }
        ExtractionRule::ContainsFlag { needle } => {
            if text_lower.contains(&needle.to_lowercase()) {
                specs.insert(rule.field.clone(), SpecValue::Flag(true));
            }
        }
        ExtractionRule::ContainsAppend { needle, value } => {
            if text_lower.contains(&needle.to_lowercase()) {
                append_to_list(specs, &rule.field, value.clone());
            }
        }
    }
}

/// An invalid pattern is a configuration defect, not a document problem:
/// warn and treat the field as a miss.
fn compile(pattern: &str, field: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(field, %e, "invalid extraction pattern, skipping field");
            None
        }
    }
}

/// All matches of the pattern, trimmed; capture group 1 when the pattern has
/// one, otherwise the full match. Deduplication preserves first-seen order.
fn collect_matches(re: &Regex, text: &str, dedup: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
            continue;
        };
        let value = m.as_str().trim().to_string();
        if value.is_empty() {
            continue;
        }
        if dedup && !seen.insert(value.clone()) {
            continue;
        }
        out.push(value);
    }
    out
}

fn append_to_list(specs: &mut TechnicalSpecMap, field: &str, value: String) {
    if let Some(SpecValue::List(items)) = specs.get_mut(field) {
        items.push(value);
        return;
    }
    let replacement = match specs.remove(field) {
        Some(SpecValue::Text(existing)) => SpecValue::List(vec![existing, value]),
        _ => SpecValue::List(vec![value]),
    };
    specs.insert(field.to_string(), replacement);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SpecExtractor {
        SpecExtractor::new(DatasheetRuleSets::default())
    }

    const LENOVO_SAMPLE: &str = "\
ThinkPad E14 Gen 5 (Intel)
Processor Family Intel Core i5 / i7
Core i5-1335U Core i7-1355U Core i5-1335U
Graphics Intel® Iris® Xe Graphics
Operating System Windows® 11 Pro 64
Max Memory 40GB
Memory Type DDR4-3200
Max Storage Support
1TB M.2 SSD
M.2 2242 SSD up to 1TB
14\" FHD (1920x1080) IPS 300nits
Dolby Atmos speaker system
Dual-microphone with Dolby Voice
65W USB-C® AC adapter
Dimensions (mm) : 313 x 219.3 x 17.9 (12.32 x 8.63 x 0.7 inches)
Starting at 1.41 kg
Graphite black top cover, Arctic grey also available, Graphite black bottom
Wi-Fi® 6E AX211, 802.11ax 2x2 + Bluetooth® 5.1
USB 3.2 Gen 1, Thunderbolt™ 4 / USB4® 40Gbps, HDMI® 2.1, RJ-45
TPM 2.0 discrete chip
Touch style fingerprint reader integrated in power button
Windows® Hello IR camera
ENERGY STAR® 8.0, EPEAT™ Gold, TCO Certified 9.0, RoHS compliant
MIL-STD-810H military test passed
";

    #[test]
    fn lenovo_extraction_covers_expected_fields() {
        let specs = extractor().extract_from_text(Brand::Lenovo, LENOVO_SAMPLE);

        assert_eq!(
            specs.get("processor_family"),
            Some(&SpecValue::Text("Intel Core i5 / i7".to_string()))
        );
        assert_eq!(
            specs.get("max_memory"),
            Some(&SpecValue::Text("40GB".to_string()))
        );
        assert_eq!(
            specs.get("security_chip"),
            Some(&SpecValue::Text("TPM 2.0".to_string()))
        );
        assert_eq!(specs.get("fingerprint_reader"), Some(&SpecValue::Flag(true)));
        assert_eq!(specs.get("windows_hello"), Some(&SpecValue::Flag(true)));
        assert_eq!(
            specs.get("mil_certification"),
            Some(&SpecValue::Text("MIL-STD-810H passed".to_string()))
        );

        match specs.get("display_options") {
            Some(SpecValue::List(items)) => {
                assert!(items[0].starts_with("14\" FHD"));
            }
            other => panic!("unexpected display_options: {other:?}"),
        }
    }

    #[test]
    fn processor_models_deduplicate_in_first_seen_order() {
        let specs = extractor().extract_from_text(Brand::Lenovo, LENOVO_SAMPLE);
        assert_eq!(
            specs.get("processor_models"),
            Some(&SpecValue::List(vec![
                "Core i5-1335U".to_string(),
                "Core i7-1355U".to_string(),
            ]))
        );
    }

    #[test]
    fn case_colors_deduplicate_preserving_first_seen_order() {
        let specs = extractor().extract_from_text(Brand::Lenovo, LENOVO_SAMPLE);
        assert_eq!(
            specs.get("case_colors"),
            Some(&SpecValue::List(vec![
                "Graphite black".to_string(),
                "Arctic grey".to_string(),
            ]))
        );
    }

    #[test]
    fn missing_memory_label_degrades_to_absent_field() {
        let text = "Processor Family Intel Core i5\n14\" FHD panel\n";
        let specs = extractor().extract_from_text(Brand::Lenovo, text);
        assert!(specs.get("max_memory").is_none());
        assert!(specs.get("memory_type").is_none());
        assert!(specs.contains_key("processor_family"));
    }

    #[test]
    fn hp_processor_family_spans_lines_until_available_processors() {
        let text = "\
Processor family 13th Generation Intel® Core™ i5
13th Generation Intel® Core™ i7
Available Processors
Intel® Core™ i5-1334U
Intel® Core™ i7-1355U
";
        let specs = extractor().extract_from_text(Brand::Hp, text);
        match specs.get("processor_family") {
            Some(SpecValue::Text(family)) => {
                assert!(family.contains("13th Generation"));
                assert!(!family.contains("Available Processors"));
            }
            other => panic!("unexpected processor_family: {other:?}"),
        }
    }

    #[test]
    fn hp_pentium_presence_appends_to_processor_models() {
        let text = "Available Processors\nIntel® Core™ i5-1334U\nIntel® Pentium® U300\n";
        let specs = extractor().extract_from_text(Brand::Hp, text);
        match specs.get("processor_models") {
            Some(SpecValue::List(models)) => {
                assert!(models.contains(&"Intel® Core™ i5-1334U".to_string()));
                assert!(models.contains(&"Intel Pentium U300".to_string()));
            }
            other => panic!("unexpected processor_models: {other:?}"),
        }
    }

    #[test]
    fn hp_recycled_materials_yield_environmental_list() {
        let text = "Made with Recycled plastics and packaging.";
        let specs = extractor().extract_from_text(Brand::Hp, text);
        assert_eq!(
            specs.get("environmental_materials"),
            Some(&SpecValue::List(vec![
                "Recycled plastics, packaging, low halogen".to_string()
            ]))
        );
    }

    #[test]
    fn plain_text_document_decodes_as_is() {
        let text = decode_document(b"Processor Family Intel\n").unwrap();
        assert!(text.starts_with("Processor Family"));
    }

    #[test]
    fn undecodable_document_raises_parse_error() {
        let err = decode_document(&[0xff, 0xfe, 0x00, 0x9c]).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }

    #[test]
    fn truncated_pdf_raises_parse_error() {
        let err = decode_document(b"%PDF-1.7 not actually a pdf").unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }

    #[test]
    fn extract_empty_document_yields_empty_map() {
        let specs = extractor().extract(Brand::Lenovo, b"nothing relevant here").unwrap();
        assert!(specs.is_empty());
    }
}
