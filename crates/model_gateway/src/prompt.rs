//! Constrained prompt construction.
//!
//! The prompt enumerates the candidate ids and tells the model to pick only
//! from them. This steers the model; the validator enforces.

use serde_json::Value;
use std::fmt::Write;

use fitforge_core::{CatalogItem, ChatMessage, GenerationRequest, IntentCategory};

/// What one prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub request: &'a GenerationRequest,
    pub candidates: &'a [&'a CatalogItem],
    pub desired_entries: usize,
    /// Error from the previous attempt, for the stricter regeneration pass.
    pub feedback: Option<&'a str>,
    /// JSON schema of the expected answer.
    pub schema: &'a Value,
}

const SYSTEM_WORKOUT: &str = "You are a certified strength and conditioning coach. \
You design safe, effective workouts using only exercises from the provided catalog.";

const SYSTEM_MEAL: &str = "You are a registered dietitian. \
You design balanced meals using only foods from the provided catalog.";

/// Build the system and user messages for one completion call.
pub fn build_messages(ctx: &PromptContext<'_>) -> Vec<ChatMessage> {
    let category = ctx.request.intent.category();
    let system = match category {
        IntentCategory::Workout => SYSTEM_WORKOUT,
        IntentCategory::Meal => SYSTEM_MEAL,
    };

    vec![
        ChatMessage::system(format!(
            "{}\nRespond with a single JSON object that validates against this JSON schema, \
             and nothing else:\n{}",
            system,
            serde_json::to_string_pretty(ctx.schema).unwrap_or_else(|_| ctx.schema.to_string())
        )),
        ChatMessage::user(user_prompt(ctx)),
    ]
}

fn user_prompt(ctx: &PromptContext<'_>) -> String {
    let req = ctx.request;
    let c = &req.constraints;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Create a {} plan.", req.intent);
    match req.intent.category() {
        IntentCategory::Workout => {
            let _ = writeln!(out, "Target duration: {:.0} minutes.", req.target);
        }
        IntentCategory::Meal => {
            let _ = writeln!(out, "Target energy: {:.0} kcal.", req.target);
        }
    }
    let _ = writeln!(out, "Experience level: {}.", c.experience_level.as_str());
    let _ = writeln!(out, "Available equipment: {}.", join_or(&c.equipment, "none"));
    let _ = writeln!(out, "Must avoid: {}.", join_or(&c.exclusions, "nothing"));
    let _ = writeln!(out, "Number of entries: {}.", ctx.desired_entries);

    let _ = writeln!(
        out,
        "\nChoose ONLY from the following ids. Any other id will be rejected.\nAllowed ids:"
    );
    for item in ctx.candidates {
        let tags: Vec<&str> = item.descriptive_tags().into_iter().collect();
        let _ = writeln!(out, "- {}: {} [{}]", item.id, item.name, tags.join(", "));
    }

    let _ = match req.intent.category() {
        IntentCategory::Workout => writeln!(
            out,
            "\nEach entry: {{\"id\": <allowed id>, \"sets\": int, \"reps\": int, \"rest_seconds\": int}}."
        ),
        IntentCategory::Meal => writeln!(
            out,
            "\nEach entry: {{\"id\": <allowed id>, \"servings\": number}}."
        ),
    };

    if let Some(feedback) = ctx.feedback {
        let _ = writeln!(
            out,
            "\nYour previous answer was rejected: {}\n\
             Return strictly valid JSON matching the format above, using only allowed ids.",
            feedback
        );
    }

    out
}

fn join_or(set: &std::collections::BTreeSet<String>, empty: &str) -> String {
    if set.is_empty() {
        empty.to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
