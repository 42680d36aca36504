/// Sentinel the model is told to reply with when no novel follow-up exists.
pub const NO_SUGGESTIONS: &str = "NONE";

const MAX_SUGGESTIONS: usize = 2;

/// Parses raw model output into candidate questions: one per line, leading
/// enumeration markers stripped, blanks and the sentinel dropped, capped at
/// two.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | ' ')
            })
            .trim()
            .to_string()
        })
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(NO_SUGGESTIONS))
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Drops candidates that near-duplicate a previously asked question, judged
/// by case-insensitive containment in either direction. Deliberately
/// over-filters: losing an occasional fresh phrasing beats re-suggesting a
/// question the user already asked. Survivor order is preserved.
pub fn filter_candidates(candidates: Vec<String>, previous_questions: &[String]) -> Vec<String> {
    let previous: Vec<String> = previous_questions
        .iter()
        .map(|question| question.trim().to_lowercase())
        .filter(|question| !question.is_empty())
        .collect();

    candidates
        .into_iter()
        .filter(|candidate| {
            let lowered = candidate.trim().to_lowercase();
            !previous
                .iter()
                .any(|question| lowered.contains(question) || question.contains(&lowered))
        })
        .collect()
}
