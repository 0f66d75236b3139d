//! crates/tutor_core/src/prompts.rs
//!
//! System prompts and user-message templates for every model task.

pub const JSON_TUTOR_SYSTEM: &str = "You are an expert English tutor API. You must strictly output valid JSON only. No markdown formatting, no conversational text.";

pub const CHAT_TUTOR_SYSTEM: &str = "You are a helpful AI Living Tutor for students. You can ONLY discuss topics related to elementary, middle, and high school education (subjects, study tips, homework help, school life). If the user asks about anything else, politely decline and steer the conversation back to education.";

pub const STYLE_SYSTEM: &str =
    "You are an expert writing style analyst. Provide clear, structured analysis.";
pub const EVALUATION_SYSTEM: &str =
    "You are a professional writing evaluator. Be specific with examples.";
pub const IMPROVEMENT_SYSTEM: &str =
    "You are an encouraging writing coach. Provide specific, actionable suggestions.";
pub const REFINEMENT_SYSTEM: &str = "You are an expert editor. Maintain original voice while improving clarity, grammar, and flow.";
pub const FOLLOWUP_SYSTEM: &str = "You are a thoughtful teacher. Generate personalized follow-up questions to deepen student understanding.";

const STYLE_TEMPLATE: &str = r#"Analyze this writing sample for style, topic, tone, and genre:

WRITING SAMPLE:
---
{draft}
---

Answer in TWO PARTS:

PART 1 - SUMMARY (2-3 sentences): the overall style, main topic, tone, and intended audience.

PART 2 - DETAILED ANALYSIS covering writing style, topic, tone, genre and format, and target audience.

Quote the text directly wherever possible."#;

const EVALUATION_TEMPLATE: &str = r#"Analyze this writing for strengths and weaknesses.

A STRENGTH shows skill, not mere presence (vivid wording, correctly cited sources).
A WEAKNESS hurts quality or is done incorrectly (grammar errors, quotes without attribution,
run-on sentences, vague or repetitive phrasing). Neutral observations are neither.

WRITING:
---
{draft}
---

Answer in TWO PARTS:

PART 1 - SUMMARY (2-3 sentences): what is done well versus what needs fixing.

PART 2 - DETAILED FEEDBACK:
STRENGTHS (2-4 items): the strength, an exact quote, why it shows skill.
WEAKNESSES (2-5 items): the weakness, an exact quote, its impact on the reader.

If something was attempted but done incorrectly, list it as a weakness."#;

const IMPROVEMENT_TEMPLATE: &str = r#"Suggest specific improvements for this writing:

WRITING:
---
{draft}
---

Every suggestion must point at specific words in the text. No generic advice.

Answer in TWO PARTS:

PART 1 - SUMMARY (2-3 sentences): the 2-3 changes with the biggest impact.

PART 2 - SUGGESTIONS (4-6 items, highest impact first), each with:
1. LOCATION: the quoted text
2. THE ISSUE: what is wrong with it
3. IMPACT: why it matters to the reader
4. SPECIFIC FIX: before -> after
5. WHY THIS WORKS"#;

const REFINEMENT_TEMPLATE: &str = r#"Rewrite this writing, improving it while keeping the original voice and meaning:

ORIGINAL:
---
{draft}
---

Priorities, in order: fix critical errors (grammar, agreement, spelling, citations), replace
vague phrases, improve sentence variety and flow, strengthen evidence, keep the student's voice.

Answer in TWO PARTS:

PART 1 - SUMMARY OF CHANGES (3-4 sentences).

PART 2 - REFINED VERSION, followed by a 2-3 sentence note on the improvements made.

Do not change the core message or add new ideas."#;

const FOLLOWUP_TEMPLATE: &str = r#"Based on the student's writing and the previous analysis (if available), generate 3-5 personalized follow-up questions.

WRITING:
---
{draft}
---

STYLE ANALYSIS (Context):
{style}

CONTENT EVALUATION (Context):
{evaluation}

The questions should help the student understand their stylistic choices, think critically about
vocabulary and structure, and address the weaknesses named in the evaluation. Be encouraging.

Format as a numbered list with a one-line 'Goal' for each question."#;

const LESSON_TEMPLATE: &str = r#"Create an English reading lesson for {level} level students.
Topic: {topic}.
Ensure the article is unique and creative.

Output strictly valid JSON with this structure:
{
  "article": {
    "id": "{article_id}",
    "title": "String",
    "readTime": "String (e.g. 5 MIN READ)",
    "content": ["Paragraph 1", "Paragraph 2", "Paragraph 3"],
    "type": "article"
  },
  "questions": [
    {
      "id": 1,
      "text": "Question text?",
      "correctId": 2,
      "explanation": "Why the answer is correct",
      "options": [
        {"id": 1, "label": "A", "text": "Option 1"},
        {"id": 2, "label": "B", "text": "Option 2"},
        {"id": 3, "label": "C", "text": "Option 3"},
        {"id": 4, "label": "D", "text": "Option 4"}
      ]
    }
  ]
}"#;

const RECOMMENDATIONS_TEMPLATE: &str = r#"Generate 5 recommended English reading content items for a {level} student.
Mix of 'News' and 'Blog'.

Output strictly valid JSON array of objects:
[
  {
    "id": "String",
    "title": "String",
    "level": "String (e.g. B2 Intermediate)",
    "readTime": "String (e.g. 5 MIN READ)",
    "snippet": "Short description",
    "type": "News"
  }
]"#;

pub const LESSON_TOPICS: [&str; 10] = [
    "The Future of Artificial Intelligence",
    "Sustainable Living and Minimalist Lifestyles",
    "The History of Coffee Culture",
    "Space Exploration: Mars and Beyond",
    "The Psychology of Happiness",
    "Remote Work: Benefits and Challenges",
    "The Impact of Social Media on Communication",
    "Underwater Ecosystems and Coral Reefs",
    "Traditional vs Modern Education Systems",
    "The Rise of Electric Vehicles",
];

pub fn style(draft: &str) -> String {
    fill(STYLE_TEMPLATE, &[("draft", draft)])
}

pub fn evaluation(draft: &str) -> String {
    fill(EVALUATION_TEMPLATE, &[("draft", draft)])
}

pub fn improvement(draft: &str) -> String {
    fill(IMPROVEMENT_TEMPLATE, &[("draft", draft)])
}

pub fn refinement(draft: &str) -> String {
    fill(REFINEMENT_TEMPLATE, &[("draft", draft)])
}

pub fn followup(draft: &str, style: Option<&str>, evaluation: Option<&str>) -> String {
    fill(
        FOLLOWUP_TEMPLATE,
        &[
            ("draft", draft),
            ("style", style.unwrap_or("Not available")),
            ("evaluation", evaluation.unwrap_or("Not available")),
        ],
    )
}

pub fn lesson(level: &str, topic: &str, article_id: &str) -> String {
    fill(
        LESSON_TEMPLATE,
        &[("level", level), ("topic", topic), ("article_id", article_id)],
    )
}

pub fn recommendations(level: &str) -> String {
    fill(RECOMMENDATIONS_TEMPLATE, &[("level", level)])
}

/// Substitutes `{name}` placeholders in a single pass. Substituted text is
/// never rescanned, and braces that name no placeholder are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let placeholder = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (end, *value))
        });
        match placeholder {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Removes markdown code fences the model sometimes wraps JSON in.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn followup_marks_missing_context() {
        let prompt = followup("The dog run fast.", Some("Informal."), None);
        assert!(prompt.contains("The dog run fast."));
        assert!(prompt.contains("Informal."));
        assert!(prompt.contains("Not available"));
    }

    #[test]
    fn draft_placeholders_in_user_text_are_not_expanded() {
        let prompt = followup("I wrote {style} here", Some("formal"), Some("good"));
        assert!(prompt.contains("I wrote {style} here"));
    }

    #[test]
    fn model_text_with_placeholders_is_inserted_verbatim() {
        let prompt = followup(
            "The dog run fast.",
            Some("Mentions {draft} and {evaluation} literally."),
            Some("Clear thesis."),
        );

        assert!(prompt.contains("Mentions {draft} and {evaluation} literally."));
        assert_eq!(prompt.matches("The dog run fast.").count(), 1);
        assert!(prompt.contains("Clear thesis."));
    }

    #[test]
    fn lesson_keeps_json_braces_and_fills_every_field() {
        let prompt = lesson("B2", "Tides {level}", "gen-42");

        assert!(prompt.contains("for B2 level students"));
        assert!(prompt.contains("Topic: Tides {level}."));
        assert!(prompt.contains(r#""id": "gen-42""#));
        assert!(prompt.contains(r#""correctId": 2"#));
        assert!(prompt.trim_end().ends_with('}'));
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
