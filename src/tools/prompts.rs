//! Canned prompts served through `prompts/list` and `prompts/get`.

use serde::Serialize;

const ASSET_CREATION_STRATEGY: &str = "\
Asset Creation Strategy for FreeCAD MCP

Work through these steps whenever you build something in FreeCAD:

0. Start by calling get_objects() so you know what the document already holds.

1. Look in the parts library first:
   - List what is available with get_parts_list().
   - When a matching part exists, bring it in with insert_part_from_library().

2. When the library has nothing suitable:
   - Build primitive shapes (boxes, cylinders, spheres and so on) with create_object().
   - Refine their properties with edit_object().

3. Give every new object a clear, descriptive name.

4. Set placement, scale and rotation explicitly with edit_object() so parts line up with each other.

5. After each edit, read the object back with get_object() and check the change took effect.

6. For anything the dedicated tools cannot express, run a custom Python script with execute_code().

Fall back to primitive shapes only if:
- the library has no matching part,
- the user asked for a primitive shape, or
- the geometry is complex enough to need a custom script.
";

/// A prompt as listed by `prompts/list`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Prompt name.
    pub name: &'static str,
    /// What the prompt is for.
    pub description: &'static str,
    /// Prompt arguments (none of ours take any).
    pub arguments: Vec<PromptArgument>,
}

/// A named prompt argument.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: &'static str,
    /// What the argument means.
    pub description: &'static str,
    /// Whether the argument must be given.
    pub required: bool,
}

/// Content of one prompt message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptContent {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    /// `user` or `assistant`.
    pub role: &'static str,
    /// Message body.
    pub content: PromptContent,
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptResult {
    /// What the prompt is for.
    pub description: &'static str,
    /// The rendered messages.
    pub messages: Vec<PromptMessage>,
}

struct Prompt {
    name: &'static str,
    description: &'static str,
    text: &'static str,
}

const PROMPTS: [Prompt; 1] = [Prompt {
    name: "asset_creation_strategy",
    description: "Step-by-step strategy for building assets in FreeCAD with these tools",
    text: ASSET_CREATION_STRATEGY,
}];

/// Lists every prompt.
#[must_use]
pub fn list() -> Vec<PromptDefinition> {
    PROMPTS
        .iter()
        .map(|p| PromptDefinition {
            name: p.name,
            description: p.description,
            arguments: Vec::new(),
        })
        .collect()
}

/// Renders a prompt by name, or `None` if there is no such prompt.
#[must_use]
pub fn get(name: &str) -> Option<PromptResult> {
    PROMPTS.iter().find(|p| p.name == name).map(|p| PromptResult {
        description: p.description,
        messages: vec![PromptMessage {
            role: "user",
            content: PromptContent::Text {
                text: p.text.to_string(),
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strategy_prompt_is_listed_and_renders() {
        let listed = list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "asset_creation_strategy");

        let rendered = serde_json::to_value(get("asset_creation_strategy").unwrap()).unwrap();
        assert_eq!(rendered["messages"][0]["role"], "user");
        assert_eq!(rendered["messages"][0]["content"]["type"], "text");
        let text = rendered["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.starts_with("Asset Creation Strategy for FreeCAD MCP"));
        assert!(text.contains("get_parts_list()"));
    }

    #[test]
    fn unknown_prompt_is_none() {
        assert!(get("nope").is_none());
        assert_eq!(serde_json::to_value(list()).unwrap()[0]["arguments"], json!([]));
    }
}
