use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rekan_core::answer_key::AnswerKey;
use rekan_core::model::QuestionType;
use rekan_core::parser::{parse_question_bank_str, validate_question_bank};

fn bank_toml(count: usize) -> String {
    let mut s = String::from("[bank]\nlevel = \"SD\"\nsubject = \"matematika\"\npackage = 1\n");
    for i in 0..count {
        s.push_str(&format!(
            r#"
[[questions]]
id = "q{i}"
type = "PG_KOMPLEKS"
text = "Pilih semua jawaban yang benar untuk soal {i}."
topic = "Topik {}"
answer_key = "A,C"
options = [
    {{ key = "A", label = "satu" }},
    {{ key = "B", label = "dua" }},
    {{ key = "C", label = "tiga" }},
    {{ key = "D", label = "empat" }},
]
"#,
            i % 4
        ));
    }
    s
}

fn bench_answer_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("answer_key");

    group.bench_function("single", |b| {
        b.iter(|| AnswerKey::parse(QuestionType::SingleChoice, black_box("C")))
    });

    group.bench_function("true_false", |b| {
        b.iter(|| {
            AnswerKey::parse(
                QuestionType::TrueFalseSet,
                black_box("A:TRUE,B:FALSE,C:TRUE,D:FALSE"),
            )
        })
    });

    group.bench_function("likert", |b| {
        b.iter(|| AnswerKey::parse(QuestionType::Likert, black_box("A:4,B:3,C:2,D:1")))
    });

    group.finish();
}

fn bench_bank(c: &mut Criterion) {
    let mut group = c.benchmark_group("question_bank");
    let toml = bank_toml(30);
    let path = Path::new("bench.toml");

    group.bench_function("parse_30", |b| {
        b.iter(|| parse_question_bank_str(black_box(&toml), path))
    });

    let bank = parse_question_bank_str(&toml, path).expect("bench bank parses");
    group.bench_function("validate_30", |b| {
        b.iter(|| validate_question_bank(black_box(&bank)))
    });

    group.finish();
}

criterion_group!(benches, bench_answer_keys, bench_bank);
criterion_main!(benches);
