//! candor-report: session reports.
//!
//! Renders an interview session and its summary as a self-contained HTML page
//! (evidence highlighted in each response) or as Markdown.

pub mod html;
pub mod markdown;

pub use html::{generate_html, write_html_report};
pub use markdown::{generate_markdown, write_markdown_report};

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use candor_core::aggregator::{summarize, SessionSummary};
    use candor_core::engine::AnalysisEngine;
    use candor_core::model::{InterviewSession, QuestionType};
    use candor_core::profile::ScoringProfile;
    use candor_core::record::AnalyzeRequest;

    /// A session with two answered questions and one left unanswered.
    pub async fn session() -> (InterviewSession, SessionSummary) {
        let profile = Arc::new(ScoringProfile::default());
        let engine = AnalysisEngine::rule_based(profile.clone()).unwrap();
        let id = engine
            .create_session(Some("Platform <team> loop".into()))
            .await
            .unwrap();

        let answers = [
            (
                "How would you cache search results?",
                QuestionType::Technical,
                Some("First, I would cache results in Redis because 80% of queries repeat."),
            ),
            (
                "Tell me about a missed deadline.",
                QuestionType::Behavioral,
                Some("Maybe I should have flagged it earlier. I learned to escalate sooner."),
            ),
            ("Any questions for us?", QuestionType::Situational, None),
        ];
        for (text, qt, response) in answers {
            let index = engine.add_question(id, text, qt).await.unwrap();
            engine.mark_asked(id, index).await.unwrap();
            if let Some(response) = response {
                engine
                    .analyze(&AnalyzeRequest {
                        session_id: id,
                        question_index: index,
                        response_text: response.into(),
                    })
                    .await
                    .unwrap();
            }
        }

        let session = engine.get_session(id).await.unwrap();
        let summary = summarize(&session, &profile).unwrap();
        (session, summary)
    }
}
