//! Artifact generation: prompt construction, model output clean-up and the
//! built-in template backend.

use askama::Template;
use async_trait::async_trait;
use thiserror::Error;

use crate::application::repos::ArtifactGenerator;
use crate::domain::task::Attachment;

const TITLE_MAX_CHARS: usize = 60;

/// Everything a generator needs to produce one page.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub brief: &'a str,
    pub checks: &'a [String],
    pub attachments: &'a [Attachment],
    /// Markup of the currently published page; present for revisions.
    pub prior_content: Option<&'a str>,
}

impl GenerationRequest<'_> {
    pub fn is_revision(&self) -> bool {
        self.prior_content.is_some()
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Request(String),
    #[error("generator responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generator response could not be parsed: {0}")]
    Decode(String),
    #[error("generator returned no markup")]
    EmptyOutput,
    #[error("page template failed to render: {0}")]
    Template(#[from] askama::Error),
}

pub const SYSTEM_PROMPT: &str = "You are a senior front-end developer. You answer with exactly one \
complete, self-contained HTML document and nothing else. All CSS and JavaScript must be inline. \
The page is served from static hosting, so it must not depend on any file outside the document: \
embed attachment data directly (for example as data: URIs) instead of linking to separate files.";

/// User prompt for a generation request.
pub fn build_prompt(request: &GenerationRequest<'_>) -> String {
    let mut prompt = String::new();

    match request.prior_content {
        Some(prior) => {
            prompt.push_str(
                "Update the existing page below. Keep what already works, apply the new brief \
                 as a revision, and return the full updated document.\n\n",
            );
            prompt.push_str("## Brief\n");
            prompt.push_str(request.brief.trim());
            prompt.push_str("\n\n## Existing page\n```html\n");
            prompt.push_str(prior);
            if !prior.ends_with('\n') {
                prompt.push('\n');
            }
            prompt.push_str("```\n");
        }
        None => {
            prompt.push_str("Build a single-page web app for the brief below.\n\n## Brief\n");
            prompt.push_str(request.brief.trim());
            prompt.push('\n');
        }
    }

    if !request.checks.is_empty() {
        prompt.push_str("\n## The page will be checked for\n");
        for check in request.checks {
            prompt.push_str("- ");
            prompt.push_str(check.trim());
            prompt.push('\n');
        }
    }

    if !request.attachments.is_empty() {
        prompt.push_str("\n## Attachments (embed these inline)\n");
        for attachment in request.attachments {
            prompt.push_str("- ");
            prompt.push_str(&attachment.name());
            if let Some(media) = attachment.media_type() {
                prompt.push_str(" (");
                prompt.push_str(media);
                prompt.push(')');
            }
            prompt.push_str(": ");
            prompt.push_str(attachment.reference());
            prompt.push('\n');
        }
    }

    prompt
}

/// Strip a surrounding Markdown code fence from model output.
pub fn extract_markup(raw: &str) -> Result<String, GeneratorError> {
    let trimmed = raw.trim();
    let body = match trimmed.find("```") {
        Some(start) => {
            let after_fence = &trimmed[start + 3..];
            // Skip the info string (`html`, `HTML`, ...) on the opening fence line.
            let content_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
            let content = &after_fence[content_start..];
            match content.find("```") {
                Some(end) => &content[..end],
                None => content,
            }
        }
        None => trimmed,
    };

    let markup = body.trim();
    if markup.is_empty() {
        return Err(GeneratorError::EmptyOutput);
    }
    Ok(markup.to_string())
}

/// Offline generator that renders the brief into a static page template.
#[derive(Debug, Clone, Default)]
pub struct StaticPageGenerator;

struct AttachmentView {
    name: String,
    reference: String,
    inline_image: bool,
    /// Only `data:` references are linked; anything else would leave the page.
    embedded: bool,
}

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    title: String,
    brief: &'a str,
    checks: &'a [String],
    attachments: Vec<AttachmentView>,
    revised: bool,
    previous_title: String,
}

impl StaticPageGenerator {
    pub fn render(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError> {
        let attachments = request
            .attachments
            .iter()
            .map(|attachment| AttachmentView {
                name: attachment.name(),
                reference: attachment.reference().to_string(),
                inline_image: attachment.is_inline_image(),
                embedded: attachment.is_data_uri(),
            })
            .collect();

        let previous_title = request
            .prior_content
            .and_then(document_title)
            .unwrap_or_else(|| "untitled page".to_string());

        let template = PageTemplate {
            title: page_title(request.brief),
            brief: request.brief.trim(),
            checks: request.checks,
            attachments,
            revised: request.is_revision(),
            previous_title,
        };

        Ok(template.render()?)
    }
}

#[async_trait]
impl ArtifactGenerator for StaticPageGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError> {
        self.render(request)
    }
}

fn page_title(brief: &str) -> String {
    let first_line = brief.lines().map(str::trim).find(|line| !line.is_empty());
    let Some(line) = first_line else {
        return "Untitled".to_string();
    };
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let mut title: String = line.chars().take(TITLE_MAX_CHARS - 1).collect();
    title.push('…');
    title
}

/// Text of the first `<title>` element, if any.
fn document_title(markup: &str) -> Option<String> {
    let lower = markup.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = markup[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    fn request<'a>(
        brief: &'a str,
        checks: &'a [String],
        attachments: &'a [Attachment],
        prior: Option<&'a str>,
    ) -> GenerationRequest<'a> {
        GenerationRequest {
            brief,
            checks,
            attachments,
            prior_content: prior,
        }
    }

    #[test]
    fn prompt_for_new_page_lists_checks_and_attachments() {
        let checks = vec!["Page has an h1".to_string()];
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::from("logo.png"));
        let attachments = vec![Attachment::new("data:image/png;base64,AAAA", metadata)];

        let prompt = build_prompt(&request("Build a calculator", &checks, &attachments, None));

        assert!(prompt.starts_with("Build a single-page web app"));
        assert!(prompt.contains("- Page has an h1"));
        assert!(prompt.contains("- logo.png (image/png): data:image/png;base64,AAAA"));
        assert!(!prompt.contains("Existing page"));
    }

    #[test]
    fn prompt_for_revision_embeds_prior_document() {
        let prompt = build_prompt(&request(
            "Add dark mode",
            &[],
            &[],
            Some("<html><title>Calc</title></html>"),
        ));

        assert!(prompt.starts_with("Update the existing page"));
        assert!(prompt.contains("```html\n<html><title>Calc</title></html>\n```"));
        assert!(!prompt.contains("Attachments"));
    }

    #[test]
    fn extract_markup_strips_fence_and_info_string() {
        let raw = "Here you go:\n```html\n<!DOCTYPE html>\n<p>hi</p>\n```\nEnjoy";
        assert_eq!(
            extract_markup(raw).expect("markup"),
            "<!DOCTYPE html>\n<p>hi</p>"
        );
    }

    #[test]
    fn extract_markup_passes_plain_output_through() {
        assert_eq!(
            extract_markup("  <p>plain</p>\n").expect("markup"),
            "<p>plain</p>"
        );
    }

    #[test]
    fn extract_markup_rejects_empty_output() {
        assert!(matches!(
            extract_markup("```html\n```"),
            Err(GeneratorError::EmptyOutput)
        ));
        assert!(matches!(
            extract_markup("   "),
            Err(GeneratorError::EmptyOutput)
        ));
    }

    #[test]
    fn static_page_escapes_brief_and_inlines_images() {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::from("chart.png"));
        let attachments = vec![
            Attachment::new("data:image/png;base64,AAAA", metadata),
            Attachment::new("data:text/csv;base64,YSxi", Map::new()),
        ];

        let html = StaticPageGenerator
            .render(&request("Show <b>sales", &[], &attachments, None))
            .expect("rendered");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Show &lt;b&gt;sales"));
        assert!(html.contains("<img src=\"data:image"));
        assert!(html.contains("download=\"attachment\""));
        assert!(!html.contains("class=\"revision\""));
    }

    #[test]
    fn static_page_never_links_external_references() {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::from("data.csv"));
        let attachments = vec![Attachment::new(
            "https://cdn.example.com/files/data.csv",
            metadata,
        )];

        let html = StaticPageGenerator
            .render(&request("Chart the data", &[], &attachments, None))
            .expect("rendered");

        assert!(html.contains("data.csv"));
        assert!(html.contains("not bundled"));
        assert!(!html.contains("cdn.example.com"));
        assert!(!html.contains("href="));
    }

    #[test]
    fn static_page_marks_revisions_with_previous_title() {
        let html = StaticPageGenerator
            .render(&request(
                "Add dark mode",
                &[],
                &[],
                Some("<html><head><title>Calculator</title></head></html>"),
            ))
            .expect("rendered");

        assert!(html.contains("class=\"revision\""));
        assert!(html.contains("Revised from the previous version: Calculator"));
    }

    #[test]
    fn long_briefs_are_truncated_for_the_title() {
        let brief = "x".repeat(100);
        let title = page_title(&brief);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }
}
