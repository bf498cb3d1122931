//! crates/readtention_core/src/prompt.rs
//!
//! Prompt templates sent to the text-generation service.
//!
//! Everything here is pure string construction: identical inputs always yield
//! byte-identical prompts.

use crate::domain::{Book, Insight};
use crate::lens::{EmphasisTier, LensRequest, SECONDARY_SECTION_THRESHOLD};

/// Sent back to the reader whenever a conversational reply cannot be generated.
pub const FALLBACK_REPLY: &str =
    "That's an interesting thought! What part of the book made you see it that way?";

const FALLBACK_FIRST_SECTION: &str = "Main Themes";
const FALLBACK_SECOND_SECTION: &str = "Key Insights";

/// Builds the one-shot mind-map prompt for a book.
///
/// With no lens request, or an empty selection, the fixed default template is
/// returned.
pub fn mindmap_prompt(title: &str, author: &str, lens: Option<&LensRequest>) -> String {
    match lens {
        Some(request) if !request.selection.is_empty() => lens_prompt(title, author, request),
        _ => default_mindmap_prompt(title, author),
    }
}

pub fn default_mindmap_prompt(title: &str, author: &str) -> String {
    format!(
        r#"Create a comprehensive mind map of "{title}" by {author}.

Please format the response as markdown for use with Markmap, following this structure:

# {title}

## Main Themes
- [Primary theme 1]
  - [Supporting concept]
  - [Key detail]

## Key Concepts
- [Important concept 1]
  - [Sub-point]
  - [Application]

## Practical Applications
- [How to apply the ideas]
  - [Specific action]
  - [Expected outcome]

Make it comprehensive yet clear, focusing on the book's most important insights."#
    )
}

/// The focus clause: one emphasis phrase per selected lens, in input order.
pub fn focus_areas(request: &LensRequest) -> String {
    request
        .selection
        .entries()
        .iter()
        .map(|(lens, intensity)| {
            format!(
                "{} {}",
                EmphasisTier::for_intensity(*intensity).phrase(),
                lens.config().focus
            )
        })
        .collect::<Vec<_>>()
        .join(", and ")
}

/// The `##` headings requested for a lens selection, in document order.
pub fn lens_sections(request: &LensRequest) -> Vec<&'static str> {
    let ranked = request.selection.ranked();
    let top: Vec<_> = ranked.iter().take(2).collect();

    let mut sections = vec![
        top.first()
            .map(|(lens, _)| lens.primary_section())
            .unwrap_or(FALLBACK_FIRST_SECTION),
        top.get(1)
            .map(|(lens, _)| lens.primary_section())
            .unwrap_or(FALLBACK_SECOND_SECTION),
    ];
    for (lens, intensity) in top {
        if *intensity >= SECONDARY_SECTION_THRESHOLD {
            sections.push(lens.secondary_section());
        }
    }
    sections.push("Synthesis & Applications");
    sections
}

fn lens_prompt(title: &str, author: &str, request: &LensRequest) -> String {
    // Callers only reach here with a non-empty selection.
    let primary_focus = request
        .selection
        .primary()
        .map(|(lens, _)| lens.config().focus)
        .unwrap_or_default();

    let style_line = match request.preset.as_deref() {
        Some(preset) => format!("This follows the \"{}\" reading style.", preset),
        None => "This is a custom combination of perspectives.".to_string(),
    };

    let sections = lens_sections(request);
    let body = sections
        .iter()
        .enumerate()
        .map(|(idx, heading)| section_block(idx, sections.len(), heading))
        .collect::<Vec<_>>()
        .join("\n\n");

    let lens_names = request
        .selection
        .lenses()
        .map(|lens| lens.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let plural = if request.selection.len() > 1 { "s" } else { "" };

    format!(
        r#"Create a personalized mind map of "{title}" by {author}.

PERSONALIZATION INSTRUCTIONS:
- Primary perspective: {primary_focus}
- Additional focus areas: {focus}
- Tailor the content depth and emphasis based on these selected reading perspectives
- {style_line}

Please format the response as markdown for use with Markmap, following this structure:

# {title}

{body}

Make this mind map deeply relevant to the {lens_names} perspective{plural} selected. Ensure the content emphasis matches the intensity levels chosen for each lens."#,
        focus = focus_areas(request),
    )
}

fn section_block(idx: usize, total: usize, heading: &str) -> String {
    let placeholder = if idx + 1 == total {
        "- [How these perspectives come together]\n  - [Actionable insights from your selected viewpoint]\n  - [Personal relevance based on your reading lens choice]"
    } else if idx == 0 {
        "- [Key point relevant to selected perspectives]\n  - [Supporting detail focused on your lens selection]\n  - [Specific insight matching your reading style]"
    } else if idx == 1 {
        "- [Important insight from your selected perspective]\n  - [Sub-point emphasizing chosen focus areas]\n  - [Application or connection relevant to your lenses]"
    } else if idx == 3 {
        "- [Further exploration of selected themes]\n  - [Depth matching your intensity preferences]"
    } else {
        "- [Additional perspective-specific content]\n  - [Details matching your customized focus]"
    };
    format!("## {}\n{}", heading, placeholder)
}

/// Builds a mind-map prompt grounded in what the reader has said so far and
/// the insights extracted from it.
pub fn conversation_mindmap_prompt(book: &Book, user_messages: &[String], insights: &[Insight]) -> String {
    let themes: Vec<&str> = insights.iter().flat_map(|i| i.themes.iter()).map(String::as_str).collect();
    let quotes: Vec<&str> = insights.iter().flat_map(|i| i.quotes.iter()).map(String::as_str).collect();
    let takeaways: Vec<&str> = insights.iter().flat_map(|i| i.takeaways.iter()).map(String::as_str).collect();

    format!(
        r#"Create a comprehensive mind map for the book "{title}" by {author} based on the user's conversation and insights.

User Messages:
{messages}

Extracted Themes:
{themes}

Extracted Quotes:
{quotes}

Extracted Takeaways:
{takeaways}

Generate a mind map in Markmap markdown format. The structure should be:

# {title}

## Central Theme
- Main idea or thesis

## Key Concepts
- Concept 1
  - Sub-concept 1.1
  - Sub-concept 1.2
- Concept 2
  - Sub-concept 2.1
  - Sub-concept 2.2

## Important Quotes
- "Quote 1"
- "Quote 2"

## Personal Takeaways
- Takeaway 1
- Takeaway 2

## Applications
- How to apply concept 1
- How to apply concept 2

Make it comprehensive but organized. Focus on the most important insights from the user's conversation."#,
        title = book.title,
        author = book.author,
        messages = user_messages.join("\n"),
        themes = themes.join("\n"),
        quotes = quotes.join("\n"),
        takeaways = takeaways.join("\n"),
    )
}

/// System instructions for the free-form Socratic reply.
pub fn reflect_system_prompt(book: &Book) -> String {
    format!(
        "You are a Socratic reading companion helping someone think through \"{}\" by {}. \
Reply in two or three conversational sentences: acknowledge the reader's thought, \
then ask exactly one open question that pushes them to examine the idea more deeply. \
Do not lecture and do not summarize the whole book.",
        book.title, book.author
    )
}

/// System instructions for distilling the reader's answer into a central idea.
pub fn central_idea_prompt(book: &Book) -> String {
    format!(
        "The reader is building a mind map of \"{}\" by {}. They were asked for the book's \
central idea or core thesis. Restate their answer as a single concise central idea of at \
most twelve words. Reply with only that phrase, no quotes and no trailing punctuation.",
        book.title, book.author
    )
}

/// System instructions for turning the reader's answer into main branches.
pub fn branches_prompt(book: &Book, central_idea: &str) -> String {
    format!(
        "The reader is building a mind map of \"{}\" by {} around the central idea \"{}\". \
They were asked for the main branches of ideas supporting it. Turn their answer into three \
to six short branch names. Reply with only a JSON array of strings.",
        book.title, book.author, central_idea
    )
}

/// System instructions for turning the reader's answer into sub-branches of one branch.
pub fn sub_branches_prompt(book: &Book, central_idea: &str, branch: &str) -> String {
    format!(
        "The reader is building a mind map of \"{}\" by {} around the central idea \"{}\". \
They were asked for supporting sub-branches or specific examples for the branch \"{}\". \
Turn their answer into two to five short sub-branch names. Reply with only a JSON array of strings.",
        book.title, book.author, central_idea, branch
    )
}

/// System instructions for extracting structured insights from one message.
pub fn insight_extraction_prompt(book: &Book) -> String {
    format!(
        "You extract reading insights from a reader's reflection on \"{}\" by {}. \
Respond with only a JSON object of the form \
{{\"themes\": [string], \"quotes\": [string], \"takeaways\": [string]}}. \
Use empty arrays when nothing fits. Do not add commentary.",
        book.title, book.author
    )
}
