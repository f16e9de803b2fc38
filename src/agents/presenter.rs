//! Turn a responder's structured reply into what the user sees.

use crate::agents::Responder;
use crate::types::{ContractViolation, DisplayPayload};
use serde_json::Value;
use std::fmt::Write;

/// Shape a responder reply for display.
///
/// - `commet` replies become a level-4 markdown heading of their `response`
/// - `milo` replies become the flattened textbook chapter, or markdown
///   rendered from `summary` and `sections`
/// - `thalia` replies are passed through unchanged
pub fn present(responder: Responder, reply: &Value) -> Result<DisplayPayload, ContractViolation> {
    match responder {
        Responder::Commet => present_chat(reply),
        Responder::Milo => present_chapter(reply),
        Responder::Thalia => Ok(DisplayPayload::Structured(reply.clone())),
    }
}

fn unusable(responder: &str, reason: &str) -> ContractViolation {
    ContractViolation {
        contract: format!("{}_display", responder),
        reason: reason.to_string(),
    }
}

fn present_chat(reply: &Value) -> Result<DisplayPayload, ContractViolation> {
    let text = reply
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| unusable("commet", "reply has no 'response' text"))?;
    Ok(DisplayPayload::Text(format!("#### {}", text)))
}

fn present_chapter(reply: &Value) -> Result<DisplayPayload, ContractViolation> {
    if let Some(chapter) = reply
        .pointer("/textbook_chapter/llm_friendly_formatted_textbook_chapter")
        .and_then(Value::as_str)
    {
        return Ok(DisplayPayload::Text(chapter.to_string()));
    }

    if reply.get("summary").is_some() || reply.get("sections").is_some() {
        return Ok(DisplayPayload::Text(render_sections(reply)));
    }

    Err(unusable(
        "milo",
        "reply has neither a textbook chapter nor summary/sections",
    ))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Markdown for a `{summary, sections: [{title, content: [...], ...}]}` reply.
fn render_sections(reply: &Value) -> String {
    let mut md = String::new();

    if let Some(summary) = reply.get("summary") {
        let _ = write!(md, "# Summary\n\n{}\n\n", text_of(summary));
    }

    let sections = reply
        .get("sections")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for section in sections {
        let title = section.get("title").map(text_of).unwrap_or_default();
        let _ = write!(md, "## {}\n\n", title);

        let items = section
            .get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for item in items {
            let text = item.get("text").map(text_of).unwrap_or_else(|| text_of(item));
            let _ = writeln!(md, "### {}", text);

            let tags: Vec<String> = item
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().map(|t| format!("`{}`", text_of(t))).collect())
                .unwrap_or_default();
            if !tags.is_empty() {
                let _ = writeln!(md, "\n**Tags:** {}", tags.join(", "));
            }

            let references = item
                .get("references")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if !references.is_empty() {
                md.push_str("\n**References:**\n");
                for reference in references {
                    let others: Vec<String> = reference
                        .get("other_content_tags")
                        .and_then(Value::as_array)
                        .map(|tags| tags.iter().map(text_of).collect())
                        .unwrap_or_default();
                    let _ = writeln!(
                        md,
                        "- {} → {} ({})",
                        reference.get("current_tag").map(text_of).unwrap_or_default(),
                        reference
                            .get("other_content_sequential_id")
                            .map(text_of)
                            .unwrap_or_default(),
                        others.join(", ")
                    );
                }
            }
            md.push('\n');
        }

        if let Some(layout) = section.get("slide_layout") {
            let _ = write!(md, "**Slide Layout:** {}\n\n", text_of(layout));
        }

        let questions = section
            .get("assessment_questions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if !questions.is_empty() {
            md.push_str("**Assessment Questions:**\n");
            for question in questions {
                let _ = writeln!(
                    md,
                    "- {}: {}",
                    question
                        .get("question_sequential_id")
                        .map(text_of)
                        .unwrap_or_default(),
                    question
                        .get("concept_to_be_assessed")
                        .map(text_of)
                        .unwrap_or_default()
                );
            }
            md.push('\n');
        }
    }

    md
}
