//! System prompt table, one static persona prompt per supported language.
//!
//! The prompts are compiled into the binary and never change at runtime.
//! Lookup is total: every [`Language`] has an entry, and unknown selectors
//! have already been mapped to [`Language::En`] by [`Language::from_selector`].

use frames::Language;

const PROMPT_EN: &str = include_str!("../prompts/en.txt");
const PROMPT_SN: &str = include_str!("../prompts/sn.txt");
const PROMPT_ND: &str = include_str!("../prompts/nd.txt");

/// System prompt for a language.
#[must_use]
pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::En => PROMPT_EN,
        Language::Sn => PROMPT_SN,
        Language::Nd => PROMPT_ND,
    }
}

#[cfg(test)]
#[path = "prompts_test.rs"]
mod tests;
