use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use candor_core::aggregator::RunningSummary;
use candor_core::analyzer::ResponseAnalyzer;
use candor_core::evidence::extract_for_question;
use candor_core::model::{QuestionEvent, QuestionType};
use candor_core::profile::ScoringProfile;
use candor_core::scoring::RuleBasedStrategy;
use candor_core::traits::ResponseMetadata;

const QUESTION: &str = "Tell me about a project where you had to change course.";
const RESPONSE: &str = "I led the migration off our legacy queue. First, we measured \
throughput because the backlog grew 3x in a month. Then I proposed batching. \
In hindsight I should have involved the on-call team sooner. As a result we cut \
incidents by 60%.";

fn bench_rule_based(c: &mut Criterion) {
    let profile = Arc::new(ScoringProfile::default());
    let strategy = RuleBasedStrategy::new(profile);
    let evidence = extract_for_question(RESPONSE, QuestionType::Behavioral, QUESTION);
    let metadata = ResponseMetadata::measure(RESPONSE, None);

    c.bench_function("rule_based_score", |b| {
        b.iter(|| {
            strategy.score_dimensions(
                QuestionType::Behavioral,
                black_box(&metadata),
                black_box(&evidence),
            )
        })
    });
}

fn bench_analyze(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let analyzer = ResponseAnalyzer::rule_based(Arc::new(ScoringProfile::default()));
    let mut asked = QuestionEvent::new(0, QUESTION, QuestionType::Behavioral);
    asked.mark_asked(chrono::Utc::now()).unwrap();

    c.bench_function("analyze_response", |b| {
        b.iter(|| {
            let mut q = asked.clone();
            runtime.block_on(analyzer.analyze(&mut q, black_box(RESPONSE)))
        })
    });
}

fn bench_summary(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let profile = Arc::new(ScoringProfile::default());
    let analyzer = ResponseAnalyzer::rule_based(profile.clone());

    let analyses: Vec<_> = (0..30)
        .map(|i| {
            let mut q = QuestionEvent::new(i, QUESTION, QuestionType::ALL[i % 3]);
            q.mark_asked(chrono::Utc::now()).unwrap();
            runtime.block_on(analyzer.analyze(&mut q, RESPONSE)).unwrap();
            q.analysis().unwrap().clone()
        })
        .collect();

    c.bench_function("summary_30_questions", |b| {
        b.iter(|| {
            let mut running = RunningSummary::new(profile.thresholds.clone());
            for a in &analyses {
                running.push(black_box(a));
            }
            running.finish(uuid::Uuid::nil(), false)
        })
    });
}

criterion_group!(benches, bench_rule_based, bench_analyze, bench_summary);
criterion_main!(benches);
