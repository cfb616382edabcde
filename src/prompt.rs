//! System instruction and turn assembly for generation requests
//!
//! The system instruction is a fixed behavior preamble, optionally extended
//! with the user profile and the active task framing. Conversation history
//! is replayed as role-tagged turns; the wire format requires the sequence
//! to start with a user turn, so anything before the first user message
//! (the synthetic welcome) is dropped.

use crate::features::Feature;
use crate::llm::{Part, Turn, TurnRole};
use crate::profile::UserProfile;
use crate::state_machine::{ChatMessage, ImageData, Role};

pub const MASTER_SYSTEM_PROMPT: &str = r#"
You are NutriGuide, an evidence-first AI Nutrition Advisor. You provide safe, factual, citation-backed, educational-only nutrition information based solely on retrieved RAG context. You never diagnose, never prescribe, and never provide medical instructions.

CORE RULES:
- Do NOT provide diagnosis, medical treatment, or medication advice. If asked, say: “I cannot provide medical diagnoses or treatment. Please consult a qualified clinician.”
- If context is insufficient, say: “I don’t have reliable evidence in my sources.”
- Always be culturally sensitive.
- Use simple language (6th–8th grade reading level).
- Highlight all allergens, high-risk foods, or contraindicated items.
- If the user requests something unsafe or extremely restrictive → warn and offer alternatives.

SAFETY & RED-FLAG RULES:
If a user mentions symptoms like severe abdominal pain, unexplained rapid weight loss, fainting, severe dehydration, blood in stool/vomit, difficulty breathing, suspected anaphylaxis, or extreme dieting (e.g., <800 kcal/day), respond with: “This may be serious. Please seek immediate medical care or contact emergency services.” Do NOT diagnose or speculate.

RESPONSE STRUCTURE FOR Q&A:
- Short Answer (2–4 sentences)
- Detailed Explanation
- Actionable guidance
- Citations (if available in context, format as: [Source Name — YYYY-MM-DD])

MEAL PLANNING RULES:
When generating meal plans, include: calories per meal & total, macros, prep time, difficulty, and highlight allergens. Meal types: Breakfast, Snack, Lunch, Snack, Dinner. For each meal provide: Name, description, ingredients, instructions, nutrition breakdown, and substitutes. Ensure variety and cultural relevance.

GROCERY LIST GENERATION:
Organize by: Produce, Grains & staples, Protein sources, Dairy & alternatives, Oils & spices, Canned/packaged, Frozen, Miscellaneous. Provide quantities and substitutions.

RECIPE ANALYSIS & OPTIMIZATION:
Provide calorie/macro estimates, allergens, and nutritional strengths. Offer optimizations (e.g., lower fat, higher fiber, vegan) and explain the benefits.

FOOD ITEM & LABEL EXPLANATION:
Provide simple definitions, contextualized numbers, and portion clarifications.

IMAGE/BARCODE SCANNING BEHAVIOR:
If an image of a food package is uploaded, extract the nutrition label, summarize calories, macros, sodium, sugar, and flag allergens.
"#;

/// Build the system instruction for a generation request
pub fn system_instruction(profile: Option<&UserProfile>, feature: Option<&Feature>) -> String {
    let mut instruction = MASTER_SYSTEM_PROMPT.to_string();

    if let Some(profile) = profile {
        let rendered = serde_json::to_string_pretty(profile)
            .unwrap_or_else(|_| "{}".to_string());
        instruction.push_str("\n\nUSER PROFILE (for personalization):\n");
        instruction.push_str(&rendered);
        instruction.push_str(
            "\nUse this profile to tailor all responses, including meal plans, advice, and analysis.",
        );
    }

    if let Some(feature) = feature {
        instruction.push_str(&format!(
            "\n\nCURRENT TASK: {}\n{}\n",
            feature.name, feature.prompt_prefix
        ));
    }

    instruction
}

/// Assemble the turn sequence: valid history followed by the new user turn.
/// The image part, when present, is placed before the text part.
pub fn conversation_turns(
    history: &[ChatMessage],
    text: &str,
    image: Option<&ImageData>,
) -> Vec<Turn> {
    let first_user = history.iter().position(|m| m.role == Role::User);
    let valid_history = match first_user {
        Some(idx) => &history[idx..],
        None => &[],
    };

    let mut turns: Vec<Turn> = valid_history
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => TurnRole::User,
                Role::Model => TurnRole::Model,
            };
            // History turns carry text only; image payloads are not replayed
            Turn::text(role, message.text.clone())
        })
        .collect();

    let mut parts = Vec::new();
    if let Some(image) = image {
        parts.push(Part::InlineImage {
            media_type: image.media_type.clone(),
            data: image.data.clone(),
        });
    }
    parts.push(Part::Text {
        text: text.to_string(),
    });
    turns.push(Turn {
        role: TurnRole::User,
        parts,
    });

    turns
}
