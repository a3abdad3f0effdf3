//! Citation formatting and templated, citation-backed answers.

use sopcite_core::Chunk;

use crate::retriever::should_abstain;
use crate::types::{Answer, Hit};

/// Returned when retrieval is too weak to support an answer.
pub const REFUSAL: &str = "I can't find strong support for that question in the current SOP \
library. Try rephrasing, or add a protocol covering this topic.";

/// Lines of each hit shown in an answer.
const EXCERPT_LINES: usize = 8;

/// `sop-tc-002 • Procedure • Thawing • steps 1–6 (L12–L20)`
pub fn format_citation(chunk: &Chunk) -> String {
    let mut out = format!("{} • {}", chunk.doc_id, chunk.section);
    if let Some(sub) = chunk.subsection.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(" • ");
        out.push_str(sub);
    }
    if let Some((start, end)) = chunk.step_range() {
        out.push_str(&format!(" • steps {}–{}", start, end));
    }
    out.push_str(&format!(" (L{}–L{})", chunk.line_start, chunk.line_end));
    out
}

fn excerpt(text: &str) -> String {
    text.trim()
        .lines()
        .take(EXCERPT_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Compose an answer from ranked hits, or abstain when the best score is
/// below `threshold`.
pub fn compose_answer(query: &str, hits: &[Hit], threshold: f32) -> Answer {
    if should_abstain(hits.first().map(|h| h.score), threshold) {
        return Answer {
            text: REFUSAL.to_string(),
            citations: Vec::new(),
            abstained: true,
        };
    }

    let mut lines = vec![
        format!("**Question:** {}\n", query),
        "**Supported guidance (from SOP library):**".to_string(),
    ];
    let mut citations = Vec::with_capacity(hits.len());

    for (i, hit) in hits.iter().enumerate() {
        let n = i + 1;
        let chunk = &hit.chunk;
        citations.push(format!("[{}] {}", n, format_citation(chunk)));
        lines.push(format!(
            "\n{}) **{} / {}**  \n{}\n",
            n,
            chunk.doc_title,
            chunk.section,
            excerpt(&chunk.text)
        ));
    }

    lines.push("\n**Citations:**".to_string());
    lines.extend(citations.iter().map(|c| format!("- {}", c)));

    Answer {
        text: lines.join("\n"),
        citations,
        abstained: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopcite_core::Section;
    use std::collections::BTreeMap;

    fn chunk() -> Chunk {
        Chunk {
            chunk_id: "c1".into(),
            doc_id: "sop-tc-002".into(),
            doc_title: "Passaging".into(),
            source_path: "sop-tc-002.md".into(),
            version: None,
            section: Section::Procedure,
            subsection: None,
            line_start: 12,
            line_end: 20,
            step_start: None,
            step_end: None,
            text: (1..=10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n"),
            tags: BTreeMap::new(),
        }
    }

    fn hit(score: f32) -> Hit {
        Hit {
            rank: 1,
            score,
            chunk: chunk(),
        }
    }

    #[test]
    fn test_citation_minimal() {
        assert_eq!(format_citation(&chunk()), "sop-tc-002 • Procedure (L12–L20)");
    }

    #[test]
    fn test_citation_full() {
        let mut c = chunk();
        c.subsection = Some("Dissociation".into());
        c.step_start = Some(1);
        c.step_end = Some(6);
        assert_eq!(
            format_citation(&c),
            "sop-tc-002 • Procedure • Dissociation • steps 1–6 (L12–L20)"
        );
    }

    #[test]
    fn test_citation_critical_points_label() {
        let mut c = chunk();
        c.section = Section::CriticalPoints;
        assert!(format_citation(&c).starts_with("sop-tc-002 • Critical Points ("));
    }

    #[test]
    fn test_abstains_without_hits() {
        let answer = compose_answer("anything", &[], 0.25);
        assert!(answer.abstained);
        assert_eq!(answer.text, REFUSAL);
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn test_abstains_below_threshold() {
        let answer = compose_answer("anything", &[hit(0.1)], 0.25);
        assert!(answer.abstained);
    }

    #[test]
    fn test_answer_lists_excerpt_and_citations() {
        let answer = compose_answer("How do I passage?", &[hit(0.8)], 0.25);
        assert!(!answer.abstained);
        assert_eq!(answer.citations, vec!["[1] sop-tc-002 • Procedure (L12–L20)"]);
        assert!(answer.text.starts_with("**Question:** How do I passage?"));
        assert!(answer.text.contains("1) **Passaging / Procedure**"));
        assert!(answer.text.contains("line 8"));
        assert!(!answer.text.contains("line 9"));
        assert!(answer.text.ends_with("- [1] sop-tc-002 • Procedure (L12–L20)"));
    }
}
