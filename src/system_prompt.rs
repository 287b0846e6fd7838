//! Prompt construction for the router, generator, compactor and memory agent

use crate::capability::{CapabilitySummary, OperationSet};
use crate::session::{Message, OperationResults, Role};
use std::fmt::Write;

/// Generator persona
pub const GENERATOR_PROMPT: &str = r"You are a helpful research assistant. You help users find information, make calculations, and answer questions.

When you have tool results, synthesize them into a clear, helpful response. Always:
1. Be concise but complete
2. Cite sources when available
3. If multiple tools were used, combine the information coherently
4. Use natural, conversational language
5. Respond in the same language as the user's query

If no tools were used, this is a casual conversation - respond naturally and helpfully.";

const ROUTER_INTRO: &str = r"You are an intelligent routing agent. Your job is to decide if the user's request requires using external tools, and which ones.";

const ROUTER_RULES: &str = r#"DECISION LOGIC:
1. greeting / casual chat -> needsTools: false
2. specific question requiring knowledge or computation (facts, calculation, date or time, the user's own profile) -> needsTools: true
3. explicit request to "search", "calculate", "check", "remember" -> needsTools: true

IMPORTANT:
- Do not answer from your internal knowledge if a tool is appropriate.
- Only use tool names from the list above. Never invent tools.
- Before using a skill for the first time you may call `read_skill` with {"skillName": "<name>"} to load its rules. Call `list_skills` if unsure what you can do.
- Use the exact values the user provided as arguments. Never use placeholders.

CHAINING TOOLS:
- If the request needs several steps and only some are done, select the NEXT tool instead of stopping.
- When the results gathered so far fully answer the request, set needsTools to false.

OUTPUT FORMAT:
Return valid JSON matching the schema.
For 'args', provide a valid JSON STRING representation of the arguments.
Example: args: "{\"expression\": \"2 + 2\"}""#;

/// System directive for one routing step.
pub fn build_router_prompt(
    operations: &OperationSet,
    index: &[CapabilitySummary],
    instructions: &str,
) -> String {
    let mut prompt = String::from(ROUTER_INTRO);

    prompt.push_str("\n\nAvailable tools:\n");
    for op in operations.iter() {
        let _ = writeln!(
            prompt,
            "- {}: {}\n  args schema: {}",
            op.name(),
            op.description(),
            op.argument_schema()
        );
    }

    if !index.is_empty() {
        prompt.push_str("\nAvailable skills:\n");
        for skill in index {
            let _ = writeln!(prompt, "{} {}: {}", skill.icon, skill.name, skill.description);
        }
    }

    if !instructions.is_empty() {
        prompt.push_str("\n## SKILL INSTRUCTIONS:\n");
        prompt.push_str(instructions);
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(ROUTER_RULES);
    prompt
}

fn render_results(results: &OperationResults) -> String {
    results
        .iter()
        .map(|r| format!("[{}]: {}", r.key, r.value))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extra system message that grounds the generator in operation output
pub fn results_for_generator(results: &OperationResults) -> String {
    format!(
        "Tool Results:\n{}\n\nUse these results to answer the user's question.",
        render_results(results)
    )
}

/// Extra system message telling a chained router what already ran this turn
pub fn results_for_router(results: &OperationResults) -> String {
    format!(
        "Tool results so far in this turn:\n{}\n\nIf these results are enough to answer the user's request, set needsTools to false. Otherwise select only the next tools that are still needed.",
        render_results(results)
    )
}

/// Prompt asking for a summary of `messages`
pub fn build_summary_prompt(messages: &[Message]) -> String {
    let history = messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Distill the following conversation history into a concise summary.\n\
         Include any specialized context, user preferences, or important details found in previous summaries.\n\
         The summary will be used as context for future interactions.\n\n\
         Existing History:\n{history}\n"
    )
}

/// Prompt for the background memory review of one exchange
pub fn build_memory_prompt(user: &Message, assistant: &Message) -> String {
    debug_assert_eq!(user.role, Role::User);
    format!(
        r#"You are a background Memory Agent. Your goal is to silently learn about the user from their interactions.

Analyze the following interaction:
User: "{}"
AI: "{}"

Did the user explicitly provide any personal information, preferences, or facts about themselves that should be remembered?

CRITERIA:
- Ignore request-specific details (e.g., "Summarize this file").
- Ignore transient questions (e.g., "What is the weather?").
- RECORD: Names, locations, job titles, technical preferences (e.g., "I use VS Code"), hobbies, etc.

Return a JSON decision."#,
        user.content, assistant.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Operation;
    use crate::runtime::testing::FnOperation;
    use std::sync::Arc;

    fn ops() -> OperationSet {
        [
            Arc::new(FnOperation::constant("calculator", "Do math")) as Arc<dyn Operation>,
            Arc::new(FnOperation::constant("get_datetime", "Tell time")) as Arc<dyn Operation>,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_router_prompt_lists_operations_and_instructions() {
        let index = vec![CapabilitySummary {
            name: "calculator".to_string(),
            description: "Math".to_string(),
            icon: "🔢".to_string(),
        }];
        let prompt = build_router_prompt(&ops(), &index, "Always show your work.");

        assert!(prompt.contains("- calculator: Do math"));
        assert!(prompt.contains("- get_datetime: Tell time"));
        assert!(prompt.contains("🔢 calculator: Math"));
        assert!(prompt.contains("## SKILL INSTRUCTIONS:\nAlways show your work."));
        assert!(prompt.ends_with(ROUTER_RULES));
    }

    #[test]
    fn test_router_prompt_omits_empty_sections() {
        let prompt = build_router_prompt(&OperationSet::new(), &[], "");
        assert!(!prompt.contains("SKILL INSTRUCTIONS"));
        assert!(!prompt.contains("Available skills"));
    }

    #[test]
    fn test_results_rendering() {
        let mut results = OperationResults::new();
        results.insert("calculator_0", "Result: 4");
        results.insert("get_datetime_1", "now");

        assert_eq!(
            results_for_generator(&results),
            "Tool Results:\n[calculator_0]: Result: 4\n\n[get_datetime_1]: now\n\nUse these results to answer the user's question."
        );
        assert!(results_for_router(&results).contains("[get_datetime_1]: now"));
    }

    #[test]
    fn test_summary_prompt_labels_roles() {
        let prompt = build_summary_prompt(&[Message::user("hi"), Message::assistant("hello")]);
        assert!(prompt.contains("USER: hi\nASSISTANT: hello"));
    }

    #[test]
    fn test_memory_prompt_quotes_exchange() {
        let prompt = build_memory_prompt(&Message::user("I'm Ada"), &Message::assistant("Hi Ada"));
        assert!(prompt.contains("User: \"I'm Ada\""));
        assert!(prompt.contains("AI: \"Hi Ada\""));
    }
}
