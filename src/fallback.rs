//! Local keyword-matched answering, used when no remote model is reachable.
//!
//! A static ordered table maps HR topics to keyword sets and template
//! phrases; the first topic whose keywords appear in both the question and
//! the concatenated source text wins. This is a deliberate simplification —
//! substring matching, not semantic search — kept behind the
//! [`AnswerStrategy`](crate::engine::AnswerStrategy) seam so a smarter
//! matcher could replace it without touching the session layer.

use async_trait::async_trait;

use crate::engine::{AnswerError, AnswerStrategy};
use crate::models::{Message, Source};

/// One row of the topic table: keywords plus the phrases that wrap a
/// matched answer.
struct TopicRule {
    name: &'static str,
    keywords: &'static [&'static str],
    intro: &'static str,
}

/// Invitational question closing every templated answer.
const CLOSING: &str = "هل تحب أوضح لك أي نقطة ثانية؟";

/// Ordered topic table; first match wins. Keyword lists mix Arabic surface
/// forms and Latin romanizations to tolerate mixed-script questions.
const RULES: &[TopicRule] = &[
    TopicRule {
        name: "salary",
        keywords: &["راتب", "رواتب", "معاش", "salary", "rateb"],
        intro: "بخصوص الرواتب، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "leave",
        keywords: &["إجازة", "اجازة", "إجازات", "اجازات", "leave", "vacation"],
        intro: "بخصوص الإجازات، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "insurance",
        keywords: &["تأمين", "تامين", "التأمين", "insurance"],
        intro: "بخصوص التأمين، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "allowances",
        keywords: &["بدل", "بدلات", "سكن", "نقل", "allowance", "badal"],
        intro: "بخصوص البدلات، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "working-hours",
        keywords: &["دوام", "الدوام", "ساعات العمل", "working hours"],
        intro: "بخصوص ساعات الدوام، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "training",
        keywords: &["تدريب", "تأهيل", "تاهيل", "training"],
        intro: "بخصوص التدريب والتأهيل، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "performance",
        keywords: &["تقييم", "أداء", "اداء", "performance"],
        intro: "بخصوص تقييم الأداء، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "attendance",
        keywords: &["حضور", "انصراف", "غياب", "attendance"],
        intro: "بخصوص الحضور والانصراف، هذا اللي لقيته في المصادر المتاحة:",
    },
    TopicRule {
        name: "end-of-service",
        keywords: &["نهاية الخدمة", "مكافأة نهاية", "end of service"],
        intro: "بخصوص نهاية الخدمة، هذا اللي لقيته في المصادر المتاحة:",
    },
];

/// Case-tolerant substring check: the needle is compared against both the
/// raw haystack and a lowercased copy, so Latin keywords survive mixed-case
/// input and Arabic keywords are unaffected.
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    haystack.contains(keyword) || haystack.to_lowercase().contains(keyword)
}

fn any_keyword(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| contains_keyword(haystack, kw))
}

/// Pull every line containing a keyword, plus the immediately preceding and
/// following lines for context, deduplicated in document order.
fn matching_lines(text: &str, keywords: &[&str]) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![false; lines.len()];

    for (i, line) in lines.iter().enumerate() {
        if any_keyword(line, keywords) {
            if i > 0 {
                keep[i - 1] = true;
            }
            keep[i] = true;
            if i + 1 < lines.len() {
                keep[i + 1] = true;
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    lines
        .iter()
        .zip(keep)
        .filter(|(line, kept)| *kept && !line.trim().is_empty())
        .filter_map(|(line, _)| {
            let line = line.trim().to_string();
            seen.insert(line.clone()).then_some(line)
        })
        .collect()
}

/// Keyword-table answerer. Stateless; the table is compiled in.
#[derive(Default)]
pub struct KeywordAnswerer;

impl KeywordAnswerer {
    /// Produce a templated answer, or `None` when no topic matches or the
    /// matched topic's keywords never occur in the source text.
    pub fn answer(&self, question: &str, sources: &[&Source]) -> Option<String> {
        let corpus = sources
            .iter()
            .filter_map(|s| s.payload.fallback_text())
            .collect::<Vec<_>>()
            .join("\n");
        if corpus.trim().is_empty() {
            return None;
        }

        for rule in RULES {
            if !any_keyword(question, rule.keywords) {
                continue;
            }
            if !any_keyword(&corpus, rule.keywords) {
                continue;
            }
            let lines = matching_lines(&corpus, rule.keywords);
            if lines.is_empty() {
                continue;
            }
            tracing::debug!(topic = rule.name, "local fallback matched");
            return Some(format!("{}\n\n{}\n\n{}", rule.intro, lines.join("\n"), CLOSING));
        }
        None
    }
}

#[async_trait]
impl AnswerStrategy for KeywordAnswerer {
    async fn produce_answer(
        &self,
        question: &str,
        sources: &[&Source],
        _history: &[Message],
    ) -> Result<String, AnswerError> {
        self.answer(question, sources)
            .ok_or(AnswerError::OutOfScope)
    }
}
