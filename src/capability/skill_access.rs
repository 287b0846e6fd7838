//! `list_skills` and `read_skill`: let the model discover capabilities and
//! pull their instructions on demand.

use super::descriptor::{parse_args, Operation, OperationError};
use super::registry::CapabilityRegistry;
use crate::config::Config;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const LIST_SKILLS: &str = "list_skills";
pub const READ_SKILL: &str = "read_skill";

pub(super) fn operations(
    registry: Arc<CapabilityRegistry>,
    config: Arc<Config>,
) -> Vec<Arc<dyn Operation>> {
    vec![
        Arc::new(ListSkills {
            registry: Arc::clone(&registry),
            config: Arc::clone(&config),
        }),
        Arc::new(ReadSkill { registry, config }),
    ]
}

struct ListSkills {
    registry: Arc<CapabilityRegistry>,
    config: Arc<Config>,
}

#[async_trait]
impl Operation for ListSkills {
    fn name(&self) -> &str {
        LIST_SKILLS
    }

    fn description(&self) -> &str {
        "List all available skills (capabilities) of the assistant with brief descriptions. Use this when you are unsure what you can do."
    }

    fn argument_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String, OperationError> {
        let skills = self.registry.capability_index(&self.config);
        if skills.is_empty() {
            return Ok("No skills are currently available.".to_string());
        }
        serde_json::to_string_pretty(&json!({ "skills": skills }))
            .map_err(|e| OperationError::failed(e.to_string()))
    }
}

struct ReadSkill {
    registry: Arc<CapabilityRegistry>,
    config: Arc<Config>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadSkillArgs {
    skill_name: String,
}

#[async_trait]
impl Operation for ReadSkill {
    fn name(&self) -> &str {
        READ_SKILL
    }

    fn description(&self) -> &str {
        "Read the detailed instructions and rules for a specific skill. You MUST use this before using a skill for the first time or if you receive an error from a skill tool."
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skillName": {
                    "type": "string",
                    "description": "The name of the skill to read (e.g., \"calculator\", \"datetime\")."
                }
            },
            "required": ["skillName"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        let ReadSkillArgs { skill_name } = parse_args(args)?;

        let Some(skill) = self.registry.get(&skill_name) else {
            return Ok(format!(
                "Error: Skill \"{skill_name}\" not found. Use list_skills to see available skills."
            ));
        };
        if !skill.is_available(&self.config) {
            return Ok(format!(
                "Error: Skill \"{skill_name}\" is registered but not available/enabled in the current configuration."
            ));
        }
        match skill.instructions().filter(|i| !i.trim().is_empty()) {
            Some(instructions) => Ok(format!(
                "## Instructions for Skill: {skill_name}\n\n{instructions}"
            )),
            None => Ok(format!(
                "The skill \"{skill_name}\" exists but has no special instructions."
            )),
        }
    }
}
