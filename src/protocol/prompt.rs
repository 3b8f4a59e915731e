//! Prompt templates.

/// Feedback used when a validator rejects a result without saying why.
pub const DEFAULT_FEEDBACK: &str = "The previous result needs improvement.";

/// System prompt for extracting LaTeX from an image.
pub const IMAGE_SYSTEM_PROMPT: &str = "You are an expert at reading handwritten and printed \
mathematics. Transcribe the mathematical content of the image into valid LaTeX. \
Respond with the LaTeX only, without surrounding $ delimiters, code fences or commentary.";

const FORMAT_CONTRACT: &str = "Respond using exactly these three sections, in this order:\n\
<thinking>\n\
Your step-by-step reasoning.\n\
</thinking>\n\
<confidence>\n\
A single number between 0.0 and 1.0 expressing how confident you are in the result.\n\
</confidence>\n\
<result>\n\
Only the final answer, with no explanation or commentary.\n\
</result>\n";

/// Builds the prompt for the first attempt.
pub fn build_initial_prompt(task: &str, input: &str) -> String {
    let mut prompt = format!("Task: {}\n\n", task);

    prompt.push_str("Input:\n");
    prompt.push_str(input);
    prompt.push_str("\n\n");

    prompt.push_str("Analyze the input step by step before answering. ");
    prompt.push_str("Check your answer against the task before committing to it.\n\n");
    prompt.push_str(FORMAT_CONTRACT);

    prompt
}

/// Builds the prompt for a refinement pass.
///
/// Embeds the previous attempt, its reasoning and confidence, and the
/// validator's feedback. The attempt counter stays out of the prompt so the
/// model never echoes it into the result.
pub fn build_refinement_prompt(
    task: &str,
    input: &str,
    previous_result: &str,
    feedback: &str,
    previous_reasoning: &str,
    previous_confidence: f64,
) -> String {
    let mut prompt = format!("Task: {}\n\n", task);

    prompt.push_str("Input:\n");
    prompt.push_str(input);
    prompt.push_str("\n\n");

    prompt.push_str("A previous attempt produced this result:\n");
    prompt.push_str(previous_result);
    prompt.push_str("\n\n");

    if !previous_reasoning.trim().is_empty() {
        prompt.push_str("Reasoning behind the previous attempt:\n");
        prompt.push_str(previous_reasoning.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!(
        "Confidence reported for the previous attempt: {:.2}\n\n",
        previous_confidence
    ));

    prompt.push_str("Feedback on the previous attempt:\n");
    prompt.push_str(if feedback.trim().is_empty() {
        DEFAULT_FEEDBACK
    } else {
        feedback.trim()
    });
    prompt.push_str("\n\n");

    prompt.push_str("Produce an improved result. Address every point of the feedback ");
    prompt.push_str("explicitly in your reasoning, and keep what was already correct.\n\n");
    prompt.push_str(FORMAT_CONTRACT);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_prompt_structure() {
        let prompt = build_initial_prompt("Convert to LaTeX", "x squared");

        assert!(prompt.contains("Convert to LaTeX"));
        assert!(prompt.contains("x squared"));
        assert!(prompt.contains("step by step"));

        let thinking = prompt.find("<thinking>").unwrap();
        let confidence = prompt.find("<confidence>").unwrap();
        let result = prompt.find("<result>").unwrap();
        assert!(thinking < confidence && confidence < result);
    }

    #[test]
    fn test_refinement_prompt_embeds_previous_attempt() {
        let prompt = build_refinement_prompt(
            "Convert to LaTeX",
            "x squared",
            "x^{2",
            "Unbalanced braces",
            "raised x to two",
            0.4,
        );

        assert!(prompt.contains("x^{2"));
        assert!(prompt.contains("Unbalanced braces"));
        assert!(prompt.contains("raised x to two"));
        assert!(prompt.contains("0.40"));
        assert!(prompt.contains("<result>"));
        assert!(!prompt.to_lowercase().contains("iteration"));
    }

    #[test]
    fn test_refinement_prompt_default_feedback() {
        let prompt = build_refinement_prompt("t", "i", "r", "  ", "", 0.5);
        assert!(prompt.contains(DEFAULT_FEEDBACK));
        assert!(!prompt.contains("Reasoning behind"));
    }
}
