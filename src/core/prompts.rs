use serde::{Deserialize, Serialize};

use crate::models::ModelTier;

/// Internal weighting the reasoning model is asked to apply, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRubric {
    #[serde(default = "default_background_transfer")]
    pub background_transfer: u8,
    #[serde(default = "default_training_feasibility")]
    pub training_feasibility: u8,
    #[serde(default = "default_salary_fit")]
    pub salary_fit: u8,
    #[serde(default = "default_work_style")]
    pub work_style: u8,
    /// Score ceiling for careers violating training willingness or with no background overlap
    #[serde(default = "default_violation_cap")]
    pub violation_cap: u8,
}

fn default_background_transfer() -> u8 {
    30
}
fn default_training_feasibility() -> u8 {
    30
}
fn default_salary_fit() -> u8 {
    25
}
fn default_work_style() -> u8 {
    15
}
fn default_violation_cap() -> u8 {
    70
}

impl Default for ReasoningRubric {
    fn default() -> Self {
        Self {
            background_transfer: default_background_transfer(),
            training_feasibility: default_training_feasibility(),
            salary_fit: default_salary_fit(),
            work_style: default_work_style(),
            violation_cap: default_violation_cap(),
        }
    }
}

const ROLE: &str = "You are a warm, practical career advisor. \
    Speak directly to the user in the second person (\"you\", \"your\"). \
    Be encouraging but honest about the effort each transition takes.";

/// Output contract shared by both tiers. Replace `{min_score}` and `{max_matches}`.
const OUTPUT_CONTRACT: &str = r#"Respond with exactly ONE JSON array and nothing else. No prose before or after it.
Each element must have this EXACT schema:
{
  "slug": "career-slug-from-the-candidate-list",
  "title": "Career title",
  "matchScore": 85,
  "reasoning": "Why this career fits you",
  "skillsGap": ["first gap", "second gap", "third gap"],
  "transitionTimeline": "asap" | "6-24-months" | "2-4-years" | "4-plus-years"
}

Rules:
- Only use slugs from the candidate list.
- matchScore is an integer from 0 to 100. Omit careers scoring below {min_score}.
- Return at most {max_matches} careers, best first.
- skillsGap lists exactly 3 concrete skills or credentials you would still need."#;

/// Build the system instruction for a reasoning call
pub fn system_instruction(rubric: &ReasoningRubric, tier: ModelTier, min_score: u8, max_matches: usize) -> String {
    let verbosity = match tier {
        ModelTier::Full => {
            "Write 3-4 sentences of reasoning per career. \
             Tie it to specific job titles, skills and industries from the resume background."
        }
        ModelTier::Light => "Write 1-2 sentences of reasoning per career.",
    };

    let contract = OUTPUT_CONTRACT
        .replace("{min_score}", &min_score.to_string())
        .replace("{max_matches}", &max_matches.to_string());

    format!(
        "{role}\n\n\
         Score each candidate career using these internal weights:\n\
         - Background transfer: {background}%\n\
         - Training feasibility: {training}%\n\
         - Salary fit: {salary}%\n\
         - Work style alignment: {style}%\n\n\
         The user's explicit selections take priority over anything inferred from a resume. \
         A career that needs more training than the user is willing to invest, \
         or that has no overlap with their background, must score {cap} or lower.\n\n\
         {verbosity}\n\n\
         {contract}",
        role = ROLE,
        background = rubric.background_transfer,
        training = rubric.training_feasibility,
        salary = rubric.salary_fit,
        style = rubric.work_style,
        cap = rubric.violation_cap,
        verbosity = verbosity,
        contract = contract,
    )
}
