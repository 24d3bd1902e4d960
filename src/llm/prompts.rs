//! Prompt template for EC element extraction

use crate::processing::element::EcElement;

/// Extraction prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub element_extraction: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            element_extraction: ELEMENT_EXTRACTION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Fill in the element list and the job description
    pub fn render_element_extraction(&self, description: &str) -> String {
        let element_list = EcElement::ALL
            .iter()
            .map(|e| format!("- {}", e.name()))
            .collect::<Vec<_>>()
            .join("\n");

        log::debug!(
            "Rendering extraction prompt for {} chars of description",
            description.len()
        );

        self.element_extraction
            .replace("{elements}", &element_list)
            .replace("{description}", description)
    }
}

pub const SYSTEM_PROMPT: &str =
    "You extract EC classification elements from Canadian public service job descriptions.";

const ELEMENT_EXTRACTION_TEMPLATE: &str = r#"Please extract the following 9 EC classification elements from this job description:
{elements}

Respond in JSON format with keys matching the EC elements. Use an empty string for an element the description does not cover.

Job description:
{description}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_lists_every_element() {
        let prompt = PromptTemplates::default().render_element_extraction("Leads policy research.");
        for element in EcElement::ALL {
            assert!(prompt.contains(&format!("- {}", element.name())));
        }
        assert!(prompt.ends_with("Job description:\nLeads policy research."));
        assert!(!prompt.contains("{elements}"));
    }
}
