use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rekan_core::answers::AnswerStore;
use rekan_core::model::{Level, Question, QuestionOption, QuestionType, Subject};
use rekan_core::scoring::{percent, score_session};

fn make_question(n: usize, subject: Subject, question_type: QuestionType, key: &str) -> Question {
    Question {
        id: format!("bench-{n}"),
        level: Level::Sd,
        subject,
        package_number: 1,
        question_type,
        body_text: "bench".into(),
        image_url: None,
        options: ["A", "B", "C", "D"]
            .iter()
            .map(|k| QuestionOption {
                key: k.to_string(),
                label: k.to_string(),
            })
            .collect(),
        answer_key: key.into(),
        topic: Some(format!("topic-{}", n % 5)),
    }
}

fn assessment() -> (Vec<Question>, AnswerStore) {
    let mut questions = Vec::new();
    let mut answers = AnswerStore::new();
    for n in 0..30 {
        let (question_type, key, inputs) = match n % 3 {
            0 => (QuestionType::SingleChoice, "B", &["B"][..]),
            1 => (QuestionType::MultiChoice, "A,C", &["C", "A"][..]),
            _ => (
                QuestionType::TrueFalseSet,
                "A:TRUE,B:FALSE,C:TRUE,D:FALSE",
                &["A:TRUE", "B:FALSE", "C:FALSE", "D:FALSE"][..],
            ),
        };
        questions.push(make_question(n, Subject::Matematika, question_type, key));
        for input in inputs {
            answers
                .set_answer(n, question_type, input)
                .expect("valid bench input");
        }
    }
    (questions, answers)
}

fn survey() -> (Vec<Question>, AnswerStore) {
    let mut questions = Vec::new();
    let mut answers = AnswerStore::new();
    for n in 0..20 {
        questions.push(make_question(
            n,
            Subject::Karakter,
            QuestionType::Likert,
            "A:4,B:3,C:2,D:1",
        ));
        let choice = ["A", "B", "C", "D"][n % 4];
        answers
            .set_answer(n, QuestionType::Likert, choice)
            .expect("valid bench input");
    }
    (questions, answers)
}

fn bench_score_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_session");

    let (questions, answers) = assessment();
    group.bench_function("assessment_30", |b| {
        b.iter(|| score_session(black_box(&questions), black_box(&answers)))
    });

    let (questions, answers) = survey();
    group.bench_function("survey_20", |b| {
        b.iter(|| score_session(black_box(&questions), black_box(&answers)))
    });

    let (questions, _) = assessment();
    let empty = AnswerStore::new();
    group.bench_function("unanswered_30", |b| {
        b.iter(|| score_session(black_box(&questions), black_box(&empty)))
    });

    group.finish();
}

fn bench_percent(c: &mut Criterion) {
    c.bench_function("percent", |b| {
        b.iter(|| percent(black_box(67), black_box(80)))
    });
}

criterion_group!(benches, bench_score_session, bench_percent);
criterion_main!(benches);
