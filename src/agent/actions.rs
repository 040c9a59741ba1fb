//! Structured-generation actions.
//!
//! Each action turns a few plain inputs into a schema-shaped value by asking
//! the model for output conforming to the JSON schema of its `Output` type.
//! Field doc comments double as the schema descriptions the model sees.

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LanguageModel, ObjectRequest};
use crate::errors::GenerationError;
use crate::models::Tip;

/// A named structured-generation operation.
pub trait ParentingAction: Send + Sync + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    type Args: DeserializeOwned + JsonSchema + Send + Sync;
    type Output: Serialize + DeserializeOwned + JsonSchema + Send;

    fn prompt(args: &Self::Args) -> String;
}

/// Inline JSON schema for `T`, without the `$schema` marker.
pub fn json_schema<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07().with(|s| s.inline_subschemas = true).into_generator();
    let mut schema = generator.into_root_schema_for::<T>().to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

/// Runs `A` against the model and validates the result against `A::Output`.
pub async fn generate<A: ParentingAction>(
    model: &dyn LanguageModel,
    args: &A::Args,
) -> Result<A::Output, GenerationError> {
    let request = ObjectRequest {
        name: A::NAME.to_string(),
        prompt: A::prompt(args),
        schema: json_schema::<A::Output>(),
    };
    let value = model.generate_object(request).await?;
    serde_json::from_value(value).map_err(|e| GenerationError::SchemaMismatch {
        target: A::NAME.to_string(),
        message: e.to_string(),
    })
}

// ── Parenting advice ─────────────────────────────────────────────────────────

pub struct ParentingAdvice;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdviceArgs {
    /// Parenting topic, e.g. Discipline, Sleep
    pub topic: String,
    /// Age group, e.g. Toddlers, Teenagers
    pub age_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    /// Parenting topic, e.g. Discipline, Sleep
    pub topic: String,
    /// Age group, e.g. Toddlers, Teenagers
    pub age_group: String,
    /// Detailed parenting advice for the topic
    pub advice: String,
}

impl ParentingAction for ParentingAdvice {
    const NAME: &'static str = "parenting_advice";
    const DESCRIPTION: &'static str = "Get parenting advice on a topic for an age group";
    type Args = AdviceArgs;
    type Output = Advice;

    fn prompt(args: &AdviceArgs) -> String {
        format!(
            "Provide parenting advice on the topic \"{}\" for children in the age group \"{}\"",
            args.topic, args.age_group
        )
    }
}

// ── Development milestones ───────────────────────────────────────────────────

pub struct DevelopmentMilestones;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestonesArgs {
    /// Age group, e.g. Infants, Toddlers
    pub age_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Description of the developmental milestone
    pub milestone: String,
    /// Age range for this milestone, e.g. 0-6 months
    pub age_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Milestones {
    pub milestones: Vec<Milestone>,
}

impl ParentingAction for DevelopmentMilestones {
    const NAME: &'static str = "development_milestones";
    const DESCRIPTION: &'static str = "List typical developmental milestones for an age group";
    type Args = MilestonesArgs;
    type Output = Milestones;

    fn prompt(args: &MilestonesArgs) -> String {
        format!(
            "List typical developmental milestones for children in the age group \"{}\"",
            args.age_group
        )
    }
}

// ── Behavior strategies ──────────────────────────────────────────────────────

pub struct BehaviorStrategies;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorArgs {
    /// The behavior to manage, e.g. tantrums, biting
    pub behavior: String,
    pub age_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Strategy {
    /// Description of the behavior management strategy
    pub strategy: String,
    /// Expected effectiveness, e.g. High, Medium, Low
    pub effectiveness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Strategies {
    pub strategies: Vec<Strategy>,
}

impl ParentingAction for BehaviorStrategies {
    const NAME: &'static str = "behavior_strategies";
    const DESCRIPTION: &'static str = "Suggest strategies for managing a behavior at an age group";
    type Args = BehaviorArgs;
    type Output = Strategies;

    fn prompt(args: &BehaviorArgs) -> String {
        format!(
            "Suggest behavior management strategies for dealing with \"{}\" in children of the age group \"{}\"",
            args.behavior, args.age_group
        )
    }
}

// ── Parenting tips ───────────────────────────────────────────────────────────

pub struct ParentingTips;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TipsArgs {
    pub age_group: String,
    /// Situation the tips should address, e.g. picky eating
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tips {
    pub tips: Vec<Tip>,
}

impl ParentingAction for ParentingTips {
    const NAME: &'static str = "parenting_tips";
    const DESCRIPTION: &'static str = "Give short parenting tips for an age group and situation";
    type Args = TipsArgs;
    type Output = Tips;

    fn prompt(args: &TipsArgs) -> String {
        format!(
            "Provide parenting tips for children in the age group \"{}\" related to \"{}\"",
            args.age_group, args.context
        )
    }
}

// ── Customized routine ───────────────────────────────────────────────────────

pub struct CustomizedRoutine;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutineArgs {
    pub age_group: String,
    /// Areas the routine should emphasise, e.g. sleep, outdoor play
    pub focus_areas: Vec<String>,
    /// Free-text family preferences and constraints
    pub family_preferences: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoutineEntry {
    /// Time of the activity, e.g. 8:00 AM
    pub time: String,
    /// Description of the activity
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Routine {
    /// Customized daily routine with activities and times
    pub routine: Vec<RoutineEntry>,
}

impl ParentingAction for CustomizedRoutine {
    const NAME: &'static str = "customized_routine";
    const DESCRIPTION: &'static str = "Build a daily routine for a child around focus areas";
    type Args = RoutineArgs;
    type Output = Routine;

    fn prompt(args: &RoutineArgs) -> String {
        format!(
            "Generate a customized daily routine for a child in the age group \"{}\" with a focus on {}. \
             Consider family preferences: {}",
            args.age_group,
            args.focus_areas.join(", "),
            args.family_preferences
        )
    }
}
