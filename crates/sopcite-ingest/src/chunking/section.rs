//! Header text → section label, by an ordered keyword rule table.
//!
//! Header text often carries several keywords ("Safety Materials"), so the
//! first matching rule wins and the table order is part of the contract.

use sopcite_core::Section;

/// One classification rule: the label applies when the normalized header
/// contains any of `keywords` or equals any of `exact`.
#[derive(Debug, Clone, Copy)]
pub struct SectionRule {
    pub label: Section,
    pub keywords: &'static [&'static str],
    pub exact: &'static [&'static str],
}

impl SectionRule {
    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|kw| normalized.contains(kw))
            || self.exact.iter().any(|e| normalized == *e)
    }
}

/// Evaluated top to bottom.
pub const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        label: Section::Purpose,
        keywords: &["purpose", "goal", "objective"],
        exact: &[],
    },
    SectionRule {
        label: Section::Scope,
        keywords: &["scope", "applies to"],
        exact: &[],
    },
    SectionRule {
        label: Section::Safety,
        keywords: &["safety", "biosafety", "ppe", "hazard"],
        exact: &[],
    },
    SectionRule {
        label: Section::Materials,
        keywords: &["material", "reagent", "consumable", "equipment", "disinfectant", "suppl"],
        exact: &[],
    },
    SectionRule {
        label: Section::Preparation,
        keywords: &["preparation", "setup", "before you begin"],
        exact: &[],
    },
    SectionRule {
        label: Section::Procedure,
        keywords: &["procedure", "steps", "protocol", "method"],
        exact: &[],
    },
    SectionRule {
        label: Section::CriticalPoints,
        keywords: &["critical", "critical point", "warnings", "caution"],
        exact: &["do not"],
    },
    SectionRule {
        label: Section::Qc,
        keywords: &["qc", "quality", "acceptance", "criteria"],
        exact: &[],
    },
    SectionRule {
        label: Section::References,
        keywords: &["reference", "citation", "link"],
        exact: &[],
    },
    SectionRule {
        label: Section::Troubleshooting,
        keywords: &["troubleshoot", "troubleshooting", "common issues"],
        exact: &[],
    },
];

/// Trim, lowercase, and spell out `&`.
pub fn normalize_header(header_text: &str) -> String {
    header_text.trim().to_lowercase().replace('&', "and")
}

/// Classify a header's text. Unmatched text is `Other`.
pub fn classify(header_text: &str) -> Section {
    let normalized = normalize_header(header_text);
    SECTION_RULES
        .iter()
        .find(|rule| rule.matches(&normalized))
        .map(|rule| rule.label)
        .unwrap_or(Section::Other)
}
