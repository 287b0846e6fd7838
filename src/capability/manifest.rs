//! `SKILL.md` manifest parsing
//!
//! A manifest is markdown with an optional `---` frontmatter block of
//! `key: value` lines. The frontmatter supplies metadata; the body is the
//! capability's usage instructions.

use super::descriptor::CapabilityMetadata;

const DEFAULT_NAME: &str = "unknown-skill";
const DEFAULT_ICON: &str = "🧩";
const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillManifest {
    pub metadata: CapabilityMetadata,
    pub instructions: String,
}

impl SkillManifest {
    pub fn parse(content: &str) -> Self {
        let (frontmatter, body) = split_frontmatter(content);

        let mut name = None;
        let mut description = None;
        let mut icon = None;
        let mut version = None;

        for line in frontmatter.unwrap_or_default().lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = unquote(value.trim());
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "name" => name = Some(value.to_string()),
                "description" => description = Some(value.to_string()),
                "icon" => icon = Some(value.to_string()),
                "version" => version = Some(value.to_string()),
                _ => {}
            }
        }

        Self {
            metadata: CapabilityMetadata {
                name: name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
                description: description.unwrap_or_default(),
                icon: icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
                version: version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            },
            instructions: body.trim().to_string(),
        }
    }

    /// Instructions, or `None` when the body is empty
    pub fn instructions(&self) -> Option<&str> {
        (!self.instructions.is_empty()).then_some(self.instructions.as_str())
    }
}

/// Returns `(frontmatter, body)`; without a well-formed block the whole
/// input is body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let frontmatter = rest.get(..offset).unwrap_or_default();
            let body = rest.get(offset + line.len()..).unwrap_or_default();
            return (Some(frontmatter.trim_end_matches(['\r', '\n'])), body);
        }
        offset += line.len();
    }
    (None, content)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
