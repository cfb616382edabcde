//! Preset task catalog
//!
//! A feature frames a chat session: it supplies the welcome message shown
//! when the task is chosen and a task-specific instruction that is appended
//! to the system prompt on every generation request.

use serde::{Deserialize, Serialize};

/// Identifier for a preset task, stored in sessions and sent over the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureId {
    GeneralQa,
    MealPlan,
    RecipeAnalysis,
    ImageAnalysis,
}

/// Static descriptor for a preset task
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub id: FeatureId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub welcome_message: &'static str,
    pub prompt_prefix: &'static str,
}

/// All features, in display order
pub const ALL_FEATURES: [FeatureId; 4] = [
    FeatureId::GeneralQa,
    FeatureId::MealPlan,
    FeatureId::RecipeAnalysis,
    FeatureId::ImageAnalysis,
];

static GENERAL_QA: Feature = Feature {
    id: FeatureId::GeneralQa,
    name: "General Q&A",
    description: "Ask any nutrition-related question.",
    icon: "lightbulb",
    welcome_message:
        "Hello! I am NutriGuide. What nutrition question can I answer for you today?",
    prompt_prefix: "Provide a clear, evidence-based answer to the user's question.",
};

static MEAL_PLAN: Feature = Feature {
    id: FeatureId::MealPlan,
    name: "Meal Plan",
    description: "Generate a daily, 3-day, or 7-day meal plan.",
    icon: "clipboard-list",
    welcome_message:
        "I can create a personalized meal plan for you. What are your goals? For how many days would you like a plan?",
    prompt_prefix:
        "Generate a detailed meal plan based on the user's request. Follow the meal planning rules precisely.",
};

static RECIPE_ANALYSIS: Feature = Feature {
    id: FeatureId::RecipeAnalysis,
    name: "Recipe Analysis",
    description: "Analyze and optimize your favorite recipes.",
    icon: "beaker",
    welcome_message:
        "Please provide a recipe (ingredients and instructions) and I can analyze it for you and suggest healthy improvements.",
    prompt_prefix:
        "Analyze the provided recipe. Provide a nutritional breakdown and offer specific, actionable optimizations.",
};

static IMAGE_ANALYSIS: Feature = Feature {
    id: FeatureId::ImageAnalysis,
    name: "Image Analysis",
    description: "Scan a food label for a quick summary.",
    icon: "scan",
    welcome_message:
        "Please upload an image of a nutrition label, and I will analyze it for you.",
    prompt_prefix:
        "Analyze the food label in the image. Summarize key nutritional information and flag any potential allergens or concerns.",
};

impl FeatureId {
    /// Resolve the static descriptor for this feature
    pub fn descriptor(self) -> &'static Feature {
        match self {
            FeatureId::GeneralQa => &GENERAL_QA,
            FeatureId::MealPlan => &MEAL_PLAN,
            FeatureId::RecipeAnalysis => &RECIPE_ANALYSIS,
            FeatureId::ImageAnalysis => &IMAGE_ANALYSIS,
        }
    }
}
