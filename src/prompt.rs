// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System prompt composition
//!
//! Each routing node gets its own role and dialect instructions; the
//! article, highlight, background articles, user rules and reflections are
//! shared sections appended after them.

use crate::article::{Article, Highlight};
use crate::assistant::{format_reflections, AssistantConfig};
use crate::codec::{FULL_REWRITE_TAG, LINE_PATCH_TAG};
use crate::routing::NextStep;
use crate::stream::THINK_TAG;

/// Everything a system prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub article: &'a Article,
    pub highlight: Option<&'a Highlight>,
    pub other_articles: &'a [Article],
    pub reference_articles: &'a [Article],
    pub assistant: &'a AssistantConfig,
}

const REPLY_ONLY_ROLE: &str = r#"You are an AI assistant tasked with responding to the user's question.
The user is currently working on an article in markdown format, you should use the current article as context when responding to the user's question.
The user may highlight some text in the current article, you should use the highlighted text as context when generating your response.
You cannot edit this article. Answer the user without producing an edited version of it.
"#;

const FULL_REWRITE_ROLE: &str = r#"You are an AI assistant tasked with responding to the user's query and editing the current article.
The user is currently working on an article in markdown format, you should use the current article as context when responding to the user's query.
The user may highlight some text in the current article, you should use the highlighted text as context when generating your response.
You should edit the current article based on the user's query, using markdown syntax when appropriate, as the text you generate will be rendered in markdown.
If the user has highlighted text, you should mainly focus on the highlighted text and the text around it.
"#;

const LINE_PATCH_ROLE: &str = r#"You are an AI article editor assistant, your job is to answer the user's query based on the article being edited or perform tasks based on the user's query.
The user is currently working on an article in markdown format, you should use the current article as context when trying to understand the user's query.
The user may highlight or select some text in the current article, if the user does, you should mainly use the highlighted text and the text around it as context.
Your abilities involve editing sentences in the article, inserting new lines, deleting lines, extending content, and so on. You cannot perform tasks beyond those of an editor assistant.
You should decide whether you need to edit the article or just answer the user's question.
"#;

fn think_instructions() -> String {
    format!(
        "Before answering you may reason step by step inside <{tag}> and </{tag}> tags. \
         The reasoning is shown to the user separately from your answer.\n",
        tag = THINK_TAG
    )
}

fn full_rewrite_instructions() -> String {
    format!(
        r#"You should always respond with two parts, the first part is your response to the user's query, the second part is the edited article.
You should always wrap the edited article in <{tag}> and </{tag}> tags, and you don't need to include any other tags in your response.

Here are some examples of how you should format your response:
<example_1>
The user's query:
Help me correct the typos in the article.
Here is the current article the user is working on:
I am a sotware enginer.
Here should be your response to the user's query:
I will help you correct the typos in the article.
<{tag}>I am a software engineer.</{tag}>
</example_1>

<example_2>
The user's query:
Help me extend this sentence to be more informative.
Here is the highlighted text in the current article the user is working on:
I am a software engineer.
Here should be your response to the user's query:
I will help you extend the sentence to be more informative.
<{tag}>I am a software engineer, and I write python and javascript.</{tag}>
</example_2>
"#,
        tag = FULL_REWRITE_TAG
    )
}

fn line_patch_instructions() -> String {
    format!(
        r#"The current article has been formatted with tags which indicate the start and end of each line.
The tags are formatted as <line_i> and </line_i>, where i is the line number, you should use these tags to wrap the edited content of the line.
If you decide to edit the article, you should wrap all the edited content in <{tag}> and </{tag}> tags.
Do not use any tags other than <line_i></line_i> and <{tag}></{tag}>, other tags may break the formatting of the article.

For example, if there are lines in the article like this:
<line_1>This is a line in the article.</line_1>
<line_2>This is another line in the article.</line_2>
And you want to edit line 1, you should wrap your edited text in the tags like this:
<{tag}>
<line_1>This is the edited line in the article.</line_1>
</{tag}>
If you want to delete line 2, you should wrap an empty line in the tags like this:
<{tag}>
<line_2></line_2>
</{tag}>
A line that is already empty cannot be deleted this way, leave it as it is.
To insert a new line, use the number of the line you want to insert after, followed by a dot and the number of the new line, counting from 1.
For example, to insert two new lines after line 2:
<{tag}>
<line_2.1>This is a new line after line 2.</line_2.1>
<line_2.2>This is a second new line after line 2.</line_2.2>
</{tag}>
To insert a new line at the beginning of the article, before line 1:
<{tag}>
<line_0.1>This is a new line at the beginning of the article.</line_0.1>
</{tag}>
You can edit, delete and insert several lines in one block. You don't need to repeat the lines you don't edit.
"#,
        tag = LINE_PATCH_TAG
    )
}

/// Build the system prompt for a routing node
pub fn build_system_prompt(step: &NextStep, ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::new();

    let tagged = match step {
        NextStep::ReplyOnly => {
            prompt.push_str(REPLY_ONLY_ROLE);
            false
        }
        NextStep::ReplyWithFullRewrite { .. } => {
            prompt.push_str(FULL_REWRITE_ROLE);
            prompt.push_str(&full_rewrite_instructions());
            false
        }
        NextStep::ReplyWithLinePatch { .. } => {
            prompt.push_str(LINE_PATCH_ROLE);
            prompt.push_str(&line_patch_instructions());
            true
        }
    };
    prompt.push_str(&think_instructions());
    prompt.push('\n');

    prompt.push_str(&current_article_section(ctx.article, tagged));
    prompt.push('\n');
    prompt.push_str(&highlight_section(ctx.article, ctx.highlight));

    if let Some(section) = articles_section(
        ctx.other_articles,
        "other_articles",
        "Other_Article_Number",
        "The user has written other articles in the past, you can use these articles as context.\n\
         There may be multiple other articles, each has a file name and content:",
    ) {
        prompt.push('\n');
        prompt.push_str(&section);
    }
    if let Some(section) = articles_section(
        ctx.reference_articles,
        "reference_articles",
        "Reference_Article_Number",
        "The user has the following reference articles they want to use as context. \
         These articles are read-only and must never be edited:",
    ) {
        prompt.push('\n');
        prompt.push_str(&section);
    }

    if !ctx.assistant.user_defined_rules.is_empty() {
        prompt.push_str("\nThe user has defined the following rules, always follow them:\n<user_rules>\n");
        for rule in &ctx.assistant.user_defined_rules {
            prompt.push_str("- ");
            prompt.push_str(rule);
            prompt.push('\n');
        }
        prompt.push_str("</user_rules>\n");
    }

    prompt.push_str(
        "\nYou have the following reflections on style guidelines and general facts about the user to use when generating your response.\n<reflections>\n",
    );
    prompt.push_str(&format_reflections(&ctx.assistant.reflections));
    prompt.push_str("\n</reflections>\n");

    prompt
}

fn current_article_section(article: &Article, tagged: bool) -> String {
    if article.is_empty() {
        return "The user has not written anything yet.\n".to_string();
    }

    let (note, body) = if tagged {
        (
            "Below is the article content the user is working on, each line is wrapped in <line_i> tags.",
            article.tagged_view(),
        )
    } else {
        (
            "Below is the article content the user is working on.",
            format!("{}\n", article.to_text()),
        )
    };

    format!(
        "Below is the file name of the article the user is currently working on:\n\
         <current_article_file_name>\n{}\n</current_article_file_name>\n\n\
         {}\n<current_article_content>\n{}</current_article_content>\n",
        article.name(),
        note,
        body
    )
}

fn highlight_section(article: &Article, highlight: Option<&Highlight>) -> String {
    let Some(highlight) = highlight.filter(|h| !h.is_empty()) else {
        return "The user has not highlighted any text.\n".to_string();
    };

    let mut section = format!(
        "The user has highlighted or selected the following text in the current article:\n\
         <highlighted_text>\n{}\n</highlighted_text>\n",
        highlight.text
    );
    if let Some((start, end)) = highlight.line_range() {
        section.push_str(&format!(
            "\nThe highlighted text belongs to the following lines of the article:\n\
             <content_around_highlight>\n{}</content_around_highlight>\n",
            article.tagged_range(start, end)
        ));
    }
    section.push_str("\nYou should use the highlighted text as context when generating your response.\n");
    section
}

fn articles_section(
    articles: &[Article],
    wrapper: &str,
    item_prefix: &str,
    intro: &str,
) -> Option<String> {
    if articles.is_empty() {
        return None;
    }

    let mut section = format!("{}\n<{}>\n", intro, wrapper);
    for (i, article) in articles.iter().enumerate() {
        let number = i + 1;
        section.push_str(&format!(
            "<{prefix}_{number}>\nArticle File Name: {name}\nContent: {content}\n</{prefix}_{number}>\n\n",
            prefix = item_prefix,
            number = number,
            name = article.name(),
            content = article.to_text()
        ));
    }
    section.push_str(&format!("</{}>\n", wrapper));
    section.push_str(
        "Use these articles as background when responding, but the current article is the most important.\n",
    );
    Some(section)
}
