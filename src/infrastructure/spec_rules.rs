//! Datasheet field-extraction rule tables
//!
//! Field coverage is data, not branching code: each manufacturer's datasheet
//! layout is described by an ordered list of independent extraction rules.
//! Layout drift across product generations is handled by patching the rule
//! table in configuration, never by editing extraction logic.

use serde::{Deserialize, Serialize};

use crate::domain::product::Brand;

/// How one spec field is located in the decoded datasheet text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// First regex match; capture group 1 becomes the field value.
    CaptureAfterLabel { pattern: String },
    /// All regex matches, duplicates collapsed, first-seen order preserved.
    CollectUnique { pattern: String },
    /// All regex matches, duplicates kept.
    CollectAll { pattern: String },
    /// Substring presence (case-insensitive) yields a fixed text value.
    /// Presence facts are typically stated once, verbatim, anywhere in the
    /// document, so no positional pattern is needed.
    ContainsText { needle: String, value: String },
    /// Substring presence yields a boolean flag.
    ContainsFlag { needle: String },
    /// Substring presence appends a fixed value to a list-valued field,
    /// creating the list if absent.
    ContainsAppend { needle: String, value: String },
}

/// One (field, rule) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecRule {
    pub field: String,
    pub rule: ExtractionRule,
}

impl SpecRule {
    fn capture(field: &str, pattern: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::CaptureAfterLabel {
                pattern: pattern.to_string(),
            },
        }
    }

    fn collect_unique(field: &str, pattern: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::CollectUnique {
                pattern: pattern.to_string(),
            },
        }
    }

    fn collect_all(field: &str, pattern: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::CollectAll {
                pattern: pattern.to_string(),
            },
        }
    }

    fn contains_text(field: &str, needle: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::ContainsText {
                needle: needle.to_string(),
                value: value.to_string(),
            },
        }
    }

    fn contains_flag(field: &str, needle: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::ContainsFlag {
                needle: needle.to_string(),
            },
        }
    }

    fn contains_append(field: &str, needle: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: ExtractionRule::ContainsAppend {
                needle: needle.to_string(),
                value: value.to_string(),
            },
        }
    }
}

/// Ordered rule list for one manufacturer's datasheet layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecRuleSet {
    pub rules: Vec<SpecRule>,
}

impl SpecRuleSet {
    /// Lenovo PSREF datasheet layout.
    pub fn lenovo_default() -> Self {
        Self {
            rules: vec![
                SpecRule::capture("processor_family", r"(?i)Processor Family\s*(.+)"),
                SpecRule::collect_unique("processor_models", r"(Core i[357]-\d{4,5}[A-Z]?)"),
                SpecRule::collect_unique(
                    "graphics_options",
                    r"(Intel® UHD Graphics|Intel® Iris® Xe Graphics|NVIDIA® GeForce MX\d+)",
                ),
                SpecRule::collect_unique(
                    "os_options",
                    r"(Windows® 11 [^\n]+|Ubuntu Linux|No preload operating system)",
                ),
                SpecRule::capture("max_memory", r"(?i)Max Memory\s*([^\n]+)"),
                SpecRule::capture("memory_type", r"(?i)Memory Type\s*([^\n]+)"),
                SpecRule::capture("max_storage", r"(?i)Max Storage Support[^\n]*\s*([^\n]+)"),
                SpecRule::collect_all("storage_types", r"M\.2 \d{4} SSD [^\n]+"),
                SpecRule::collect_all("display_options", "14\" [^\n]+"),
                SpecRule::contains_text("speakers", "Dolby Atmos", "Stereo speakers, Dolby Atmos"),
                SpecRule::contains_text(
                    "microphone",
                    "Dolby Voice",
                    "Dual-microphone array, Dolby Voice",
                ),
                SpecRule::collect_all("camera_options", r"(720p|1080p(?: \+ IR)?)"),
                SpecRule::collect_all(
                    "battery_options",
                    r"(\d{2}Wh Rechargeable Li-ion Battery[^\n]*)",
                ),
                SpecRule::collect_all("battery_life", r"MobileMark® 2018: up to [^\n]+"),
                SpecRule::collect_all("power_adapter", r"65W USB-C®.*"),
                SpecRule::capture("dimensions", r"(?i)Dimensions.*?\(([^\)]+)\)"),
                SpecRule::collect_all("weight", r"Starting at [\d\.]+ kg"),
                SpecRule::collect_unique("case_colors", r"(?i)(Arctic grey|Graphite black)"),
                SpecRule::collect_all("wireless", r"(Wi-Fi® 6E?.*?Bluetooth® [\d\.]+)"),
                SpecRule::collect_unique(
                    "ports",
                    r"(USB [^\n]+|Thunderbolt™ 4[^\n]+|HDMI® [^\n]+|RJ-45|Headphone / microphone combo)",
                ),
                SpecRule::contains_text("security_chip", "TPM 2.0", "TPM 2.0"),
                SpecRule::contains_flag("fingerprint_reader", "fingerprint reader"),
                SpecRule::contains_flag("windows_hello", "Windows® Hello"),
                SpecRule::collect_all(
                    "green_certifications",
                    r"(ENERGY STAR® 8.0|EPEAT™ Gold|TCO Certified 9.0|RoHS compliant)",
                ),
                SpecRule::contains_text("mil_certification", "MIL-STD-810H", "MIL-STD-810H passed"),
            ],
        }
    }

    /// HP datasheet layout.
    pub fn hp_default() -> Self {
        Self {
            rules: vec![
                SpecRule::capture(
                    "processor_family",
                    r"(?i)Processor family\s*([\s\S]+?)Available Processors",
                ),
                SpecRule::collect_unique("processor_models", r"Intel® Core™ i[357]-\d{4,5}[A-Z]?"),
                SpecRule::contains_append("processor_models", "Intel® Pentium", "Intel Pentium U300"),
                SpecRule::collect_unique(
                    "graphics_options",
                    r"(Intel® UHD Graphics|Intel® Iris® Xᶱ Graphics|NVIDIA® GeForce RTX™ 2050)",
                ),
                SpecRule::collect_unique("os_options", r"(Windows 11 [^\n]+|FreeDOS)"),
                SpecRule::capture("max_memory", r"(?i)Maximum memory\s*([^\n]+)"),
                SpecRule::capture("memory_slots", r"(?i)Memory slots\s*([^\n]+)"),
                SpecRule::collect_all("storage_types", r"(?:\d+ GB|\d+ TB) PCIe® NVMe™ [^\n]+"),
                SpecRule::capture("max_storage", r"(?i)Internal storage\s*([^\n]+)"),
                SpecRule::collect_all("display_options", "15\\.6\" [^\n]+"),
                SpecRule::contains_text("speakers", "Dual stereo speakers", "Dual stereo speakers"),
                SpecRule::contains_text(
                    "microphone",
                    "dual array microphones",
                    "Dual array microphones",
                ),
                SpecRule::collect_unique(
                    "camera_options",
                    r"(?i)(720p HD camera|IR Camera|5MP camera)",
                ),
                SpecRule::collect_all("battery_options", r"(\d{2} Wh [^\n]+Battery)"),
                SpecRule::collect_all("power_adapter", r"HP Smart \d+ W [^\n]+adapter"),
                SpecRule::capture("dimensions", r"(?i)Dimensions\s*([^\n]+)"),
                SpecRule::capture("weight", r"(?i)Weight\s*Starting at ([^\n]+)"),
                SpecRule::collect_all(
                    "wireless",
                    r"(Intel® Wi-Fi 6E [^\n]+|Realtek Wi-Fi 6E [^\n]+)",
                ),
                SpecRule::collect_unique(
                    "ports",
                    r"(?i)(USB Type-[AC][^\n]+|HDMI 2\.1|RJ-45|headphone/microphone combo)",
                ),
                SpecRule::capture("ethernet", r"(10/100/1000 GbE NIC)"),
                SpecRule::contains_text("security_chip", "TPM 2.0", "TPM 2.0"),
                SpecRule::contains_flag("fingerprint_reader", "Fingerprint sensor"),
                SpecRule::contains_flag("windows_hello", "IR Camera"),
                SpecRule::collect_all(
                    "green_certifications",
                    r"(ENERGY STAR® certified|EPEAT® Gold|TCO Certified)",
                ),
                SpecRule::contains_text("mil_certification", "MIL-STD", "MIL-STD tested"),
                SpecRule::contains_append(
                    "environmental_materials",
                    "recycled",
                    "Recycled plastics, packaging, low halogen",
                ),
            ],
        }
    }
}

/// Rule tables for all supported manufacturers, carried in the application
/// config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasheetRuleSets {
    pub lenovo: SpecRuleSet,
    pub hp: SpecRuleSet,
}

impl Default for DatasheetRuleSets {
    fn default() -> Self {
        Self {
            lenovo: SpecRuleSet::lenovo_default(),
            hp: SpecRuleSet::hp_default(),
        }
    }
}

impl DatasheetRuleSets {
    pub fn for_brand(&self, brand: Brand) -> &SpecRuleSet {
        match brand {
            Brand::Lenovo => &self.lenovo,
            Brand::Hp => &self.hp,
        }
    }
}
