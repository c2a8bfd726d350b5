//! Prompt Assembler: turns the question, the previous exchange and the
//! retrieved passages into the single prompt sent to the completion model.

use crate::core::config::settings::RetrievalSettings;
use crate::rag::RetrievedPassage;

const CONTEXTUAL_INSTRUCTIONS: &str = "Instructions:
- This question refers to the previous conversation
- Rely MAINLY on the previous answer and the context provided
- Expand on or clarify the requested points
- Cite only the sources relevant to the previous context
- Avoid introducing unrelated new information";

const FRESH_INSTRUCTIONS: &str = "Instructions:
- Use the documents provided to answer this new question
- Cite the most relevant sources
- Be precise and structured in your answer";

/// The turn a contextual question refers back to.
#[derive(Debug, Clone, Copy)]
pub struct PreviousExchange<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_passages: usize,
    passage_char_budget: usize,
    similarity_floor: f32,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(&RetrievalSettings::default())
    }
}

impl PromptAssembler {
    pub fn new(settings: &RetrievalSettings) -> Self {
        Self {
            max_passages: settings.prompt_passages,
            passage_char_budget: settings.passage_char_budget,
            similarity_floor: settings.contextual_similarity_floor,
        }
    }

    /// `fresh` are this question's search results; `supplementary` are
    /// passages carried over from the previous turn.
    pub fn assemble(
        &self,
        question: &str,
        contextual: bool,
        previous: Option<PreviousExchange<'_>>,
        fresh: &[RetrievedPassage],
        supplementary: &[RetrievedPassage],
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        if contextual {
            if let Some(previous) = previous {
                sections.push(format!(
                    "=== CONVERSATION CONTEXT ===\nPrevious question: {}\nPrevious answer: {}\n",
                    previous.question, previous.answer
                ));
            }
        }

        let selected = self.select_passages(contextual, fresh, supplementary);
        if !selected.is_empty() {
            let mut block = String::from("=== RELEVANT DOCUMENTS ===\n");
            for (i, passage) in selected.iter().enumerate() {
                block.push_str(&format!(
                    "[Source {}] {} (Similarity: {:.3})\nContent: {}...\n\n",
                    i + 1,
                    passage.source_name,
                    passage.similarity_score,
                    truncate_chars(&passage.text, self.passage_char_budget)
                ));
            }
            sections.push(block.trim_end_matches('\n').to_string() + "\n");
        }

        if sections.is_empty() {
            return format!("Question: {}\n\nAnswer:", question);
        }

        let context = sections.join("\n");
        if contextual {
            format!(
                "{}\nCONTEXTUAL QUESTION: {}\n\n{}\n\nAnswer:",
                context, question, CONTEXTUAL_INSTRUCTIONS
            )
        } else {
            format!(
                "{}\nNEW QUESTION: {}\n\n{}\n\nAnswer:",
                context, question, FRESH_INSTRUCTIONS
            )
        }
    }

    /// Fresh passages by descending similarity, then supplementary ones.
    /// Contextual questions keep only passages above the similarity floor
    /// (or the first two when none clear it).
    fn select_passages<'p>(
        &self,
        contextual: bool,
        fresh: &'p [RetrievedPassage],
        supplementary: &'p [RetrievedPassage],
    ) -> Vec<&'p RetrievedPassage> {
        let mut ordered: Vec<&RetrievedPassage> = fresh.iter().collect();
        ordered.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered.extend(supplementary.iter());

        if contextual {
            let relevant: Vec<&RetrievedPassage> = ordered
                .iter()
                .copied()
                .filter(|p| p.similarity_score > self.similarity_floor)
                .collect();
            ordered = if relevant.is_empty() {
                ordered.into_iter().take(2).collect()
            } else {
                relevant
            };
        }

        ordered.truncate(self.max_passages);
        ordered
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
