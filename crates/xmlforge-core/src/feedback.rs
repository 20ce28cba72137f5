//! Turns a failing score into the text sent with the next analyze/generate calls.

use crate::domain::ScoreResult;

/// Accuracy as a whole-number percentage, e.g. `0.5` becomes `50%`.
pub fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Compile feedback for the next iteration.
///
/// Returns an empty string when `score` already meets `threshold`. Output
/// depends only on `score`, so the same result always yields the same text.
pub fn compile(score: &ScoreResult, threshold: f64) -> String {
    if score.accuracy >= threshold {
        return String::new();
    }

    let mut lines = vec![
        format!("Previous iteration accuracy: {}.", percent(score.accuracy)),
        format!("Passed {}/{} pairs.", score.passed_pairs, score.total_pairs),
        String::new(),
    ];

    if let Some(error) = &score.top_level_error {
        lines.push(format!("Error: {error}"));
        lines.push(String::new());
    }

    for detail in score.failed_details() {
        lines.push(format!("--- Pair {} FAILED ---", detail.pair_id));
        if !detail.diagnostic.is_empty() {
            lines.push(format!("Diff:\n{}", detail.diagnostic));
        } else if !detail.expected_excerpt.is_empty() || !detail.actual_excerpt.is_empty() {
            lines.push(format!("Expected snippet:\n{}", detail.expected_excerpt));
            lines.push(format!("Actual snippet:\n{}", detail.actual_excerpt));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScoreDetail;

    fn score() -> ScoreResult {
        ScoreResult::from_details(vec![
            ScoreDetail::passed("p1", "<a/>".into(), "<a/>".into()),
            ScoreDetail::failed(
                "p2",
                "<b>1</b>".into(),
                "<b>2</b>".into(),
                "Found 1 difference(s):\n  1. Text at /b: '1' vs '2'".into(),
            ),
            ScoreDetail::failed("p3", "<c/>".into(), "<d/>".into(), String::new()),
            ScoreDetail::failed("p4", String::new(), String::new(), String::new()),
        ])
    }

    #[test]
    fn test_passing_score_has_no_feedback() {
        let passing = ScoreResult::from_details(vec![ScoreDetail::passed("p", String::new(), String::new())]);
        assert_eq!(compile(&passing, 0.95), "");
        assert_eq!(compile(&score(), 0.25), "");
    }

    #[test]
    fn test_failed_pairs_in_order() {
        let text = compile(&score(), 0.95);
        let expected = "Previous iteration accuracy: 25%.\n\
Passed 1/4 pairs.\n\
\n\
--- Pair p2 FAILED ---\n\
Diff:\n\
Found 1 difference(s):\n  1. Text at /b: '1' vs '2'\n\
\n\
--- Pair p3 FAILED ---\n\
Expected snippet:\n<c/>\n\
Actual snippet:\n<d/>\n\
\n\
--- Pair p4 FAILED ---\n";
        assert_eq!(text, expected);
        assert!(!text.contains("p1"));
    }

    #[test]
    fn test_top_level_error_is_included() {
        let failure = ScoreResult::run_failure(2, "Syntax error in generated code: boom");
        assert_eq!(
            compile(&failure, 0.95),
            "Previous iteration accuracy: 0%.\nPassed 0/2 pairs.\n\nError: Syntax error in generated code: boom\n"
        );
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(compile(&score(), 1.0), compile(&score(), 1.0));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.5), "50%");
        assert_eq!(percent(1.0), "100%");
        assert_eq!(percent(0.6667), "67%");
        assert_eq!(percent(0.95), "95%");
    }
}
