use crate::models::TestResult;

/// Substituted when a result carries no reference range.
pub const RANGE_PLACEHOLDER: &str = "not provided";

/// Generic next steps attached to every analysis. Not derived from model output.
pub const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Review the above results with your healthcare provider.",
    "Discuss any questions you may have about abnormal values.",
    "Consider lifestyle adjustments based on findings.",
];

pub fn default_recommendations() -> Vec<String> {
    DEFAULT_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect()
}

/// Plain-language explanation request for a single test result.
pub fn build_prompt(test: &TestResult) -> String {
    let reading = match test.unit.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(unit) => format!("{} {unit}", test.value),
        None => test.value.to_string(),
    };
    let range = test
        .reference_range
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(RANGE_PLACEHOLDER);

    format!(
        "Explain what a {name} value of {reading} means in plain English. \
         Include normal range ({range}), possible causes of abnormal levels, \
         and questions a patient might ask their doctor.",
        name = test.name.trim(),
    )
}

/// One prompt per result, in result order.
pub fn build_prompts(results: &[TestResult]) -> Vec<String> {
    results.iter().map(build_prompt).collect()
}
