use std::collections::BTreeMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::actions::{
    generate, json_schema, BehaviorStrategies, CustomizedRoutine, DevelopmentMilestones,
    ParentingAction, ParentingAdvice, ParentingTips,
};
use super::{LanguageModel, ToolSpec};
use crate::errors::{GenerationError, ToolError};

/// A tool the chat model may call by name with JSON arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn invoke(&self, model: &dyn LanguageModel, arguments: Value) -> Result<Value, ToolError>;
}

/// Exposes a [`ParentingAction`] as a tool: arguments are parsed into the
/// action's typed `Args` before anything runs.
pub struct ActionTool<A>(PhantomData<A>);

impl<A> Default for ActionTool<A> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<A: ParentingAction> ToolHandler for ActionTool<A> {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: A::NAME.to_string(),
            description: A::DESCRIPTION.to_string(),
            parameters: json_schema::<A::Args>(),
        }
    }

    async fn invoke(&self, model: &dyn LanguageModel, arguments: Value) -> Result<Value, ToolError> {
        let args: A::Args = serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
            name: A::NAME.to_string(),
            message: e.to_string(),
        })?;
        let output = generate::<A>(model, &args)
            .await
            .map_err(|source| ToolError::Execution { name: A::NAME.to_string(), source })?;
        serde_json::to_value(output).map_err(|e| ToolError::Execution {
            name: A::NAME.to_string(),
            source: GenerationError::SchemaMismatch {
                target: A::NAME.to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// Closed set of tools offered to the chat model, keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// The five parenting actions.
    pub fn parenting() -> Self {
        Self::empty()
            .with(ActionTool::<ParentingAdvice>::default())
            .with(ActionTool::<DevelopmentMilestones>::default())
            .with(ActionTool::<BehaviorStrategies>::default())
            .with(ActionTool::<ParentingTips>::default())
            .with(ActionTool::<CustomizedRoutine>::default())
    }

    pub fn with(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.tools.insert(handler.spec().name, Box::new(handler));
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Runs the named tool. Unknown names never execute anything.
    pub async fn dispatch(
        &self,
        model: &dyn LanguageModel,
        name: &str,
        arguments: Value,
    ) -> Result<Value, ToolError> {
        let handler = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool { name: name.to_string() })?;
        handler.invoke(model, arguments).await
    }
}
