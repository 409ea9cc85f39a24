//! Tool catalogue for the system prompt. Derived from the registered definitions only.

use super::ToolDefinition;

fn category(name: &str) -> &'static str {
    if name.contains("_file") || name.contains("_directory") || name.contains("search_files") {
        "File System"
    } else {
        "Web Access"
    }
}

/// Render definitions as the `## Available Tools` block. Categories appear in the order
/// their first tool was registered.
pub fn generate_tools_documentation(definitions: &[ToolDefinition]) -> String {
    let mut categories: Vec<(&'static str, Vec<&ToolDefinition>)> = Vec::new();
    for def in definitions {
        let cat = category(def.name());
        match categories.iter_mut().find(|(c, _)| *c == cat) {
            Some((_, tools)) => tools.push(def),
            None => categories.push((cat, vec![def])),
        }
    }

    let mut doc = String::from(
        "## Available Tools\n\nYou can call tools by using the following format in your response:\n\n```tool:tool_name\n{\n  \"parameter1\": \"value1\",\n  \"parameter2\": \"value2\"\n}\n```\n\n",
    );

    for (cat, tools) in &categories {
        doc.push_str(&format!("### {} Tools\n\n", cat));
        for (i, tool) in tools.iter().enumerate() {
            doc.push_str(&format!("{}. **{}** - {}\n", i + 1, tool.name(), tool.description));

            if !tool.parameters.is_empty() {
                doc.push_str("   Parameters:\n");
                for p in &tool.parameters {
                    doc.push_str(&format!(
                        "   - `{}` ({}){}: {}\n",
                        p.name,
                        p.param_type.as_str(),
                        if p.required { " *required*" } else { "" },
                        p.description
                    ));
                }
            }

            if !tool.examples.is_empty() {
                doc.push_str("   \n");
                for ex in &tool.examples {
                    doc.push_str(&format!(
                        "   {}:\n   {}\n   \n",
                        ex.description,
                        ex.code(tool.name())
                    ));
                }
            }

            doc.push('\n');
        }
    }

    doc.push_str("## Important Notes\n\n");
    doc.push_str(
        "- Always use tool calls when the user asks you to perform file operations or web requests\n",
    );
    doc.push_str("- After calling a tool, the system will execute it and show you the result\n");
    doc.push_str("- You can call multiple tools in one response\n");
    doc.push_str("- All file paths are relative to the workspace directory\n");
    doc.push_str("- For web requests, you can access any public HTTP/HTTPS URL\n");
    doc.push_str(
        "- When fetching web content, you'll receive the full response including status, headers, and data\n",
    );
    doc
}
