// Shared prompt fragments.
// Each feature module keeps its own prompts.rs; this file holds cross-cutting pieces.

/// Appended to the final message for backends that ignore structured-output parameters.
pub const JSON_ONLY_SUFFIX: &str = "\n\nIMPORTANT: Return only valid JSON. \
    No explanations, no markdown code fences, no text before or after the JSON.";

/// Common instruction for every prompt that rewrites resume content.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Use ONLY facts present in the resume data provided. \
    Do NOT invent employers, dates, metrics, certifications or achievements. \
    If the resume does not support a claim, leave it out.";

/// Tells the model personal details are intentionally absent.
pub const PRIVACY_NOTE: &str = "\
    Personal contact details have been removed from the resume data on purpose. \
    Do NOT add names, emails, phone numbers, addresses or placeholders for them.";
