use litmr::io::list_input_files;
use litmr::{run_stage, Collaborators, EngineConfig, StageKind};
use std::fs;
use std::path::{Path, PathBuf};

fn read_sorted(dir: &Path) -> Vec<String> {
    let mut lines: Vec<String> = list_input_files(dir)
        .unwrap()
        .iter()
        .flat_map(|p| fs::read_to_string(p).unwrap().lines().map(String::from).collect::<Vec<_>>())
        .collect();
    lines.sort();
    lines
}

fn book_text(dir: &Path) -> PathBuf {
    let input = dir.join("books.tsv");
    let mut body = String::new();
    for i in 0..40 {
        let year = 1880 + (i % 25);
        body.push_str(&format!("{},{}\tthe whale cut the line and the line cut back {}\n", i % 7, year, i % 3));
        if i % 9 == 0 {
            body.push('\n');
            body.push_str("no tab on this line\n");
        }
    }
    fs::write(&input, body).unwrap();
    input
}

fn run_wordfreq(input: &Path, out: &Path, cfg: EngineConfig) -> litmr::StageReport {
    run_stage(StageKind::WordFrequency, "wordfreq", &[input.to_path_buf()], out, &cfg, &Collaborators::default()).unwrap()
}

#[test]
fn output_is_independent_of_splits_tasks_reducers_and_combining() {
    let dir = tempfile::tempdir().unwrap();
    let input = book_text(dir.path());
    let work = dir.path().join("work");

    let baseline_out = dir.path().join("baseline");
    run_wordfreq(&input, &baseline_out, EngineConfig::local().with_tasks(1).with_reducers(1).with_combine(false).with_work_dir(&work));
    let baseline = read_sorted(&baseline_out);
    assert!(baseline.contains(&"0,1880,the\t3".to_string()), "{baseline:?}");

    let variants = [
        EngineConfig::local().with_tasks(4).with_reducers(3).with_split_bytes(97).with_combine(false),
        EngineConfig::local().with_tasks(4).with_reducers(3).with_split_bytes(97).with_combine(true),
        EngineConfig::local().with_tasks(3).with_reducers(5).with_split_bytes(13).with_combine(true).with_combine_max_keys(2),
        EngineConfig::local().with_tasks(2).with_reducers(2).with_local_batch_bytes(16).with_threads(2),
    ];
    for (i, cfg) in variants.into_iter().enumerate() {
        let out = dir.path().join(format!("variant{}", i));
        run_wordfreq(&input, &out, cfg.with_work_dir(&work));
        assert_eq!(read_sorted(&out), baseline, "variant {i}");
    }
}

#[test]
fn one_output_line_per_distinct_key() {
    let dir = tempfile::tempdir().unwrap();
    let input = book_text(dir.path());
    let out = dir.path().join("out");
    let report = run_wordfreq(&input, &out, EngineConfig::local().with_tasks(3).with_reducers(4).with_split_bytes(64).with_work_dir(dir.path().join("work")));

    let lines = read_sorted(&out);
    let mut keys: Vec<&str> = lines.iter().map(|l| l.split('\t').next().unwrap()).collect();
    let total = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), total);
    assert_eq!(report.reduce.total_groups as usize, total);
    assert_eq!(report.num_reducers, 4);
    assert_eq!(report.map.skipped.missing_tab, 5);
    assert_eq!(report.map.skipped.blank, 5);

    let sum: i64 = lines.iter().map(|l| l.rsplit('\t').next().unwrap().parse::<i64>().unwrap()).sum();
    assert_eq!(sum as u64, report.map.total_emits);
}

#[test]
fn empty_input_still_commits_an_empty_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.tsv");
    fs::write(&input, "").unwrap();
    let out = dir.path().join("out");
    let report = run_wordfreq(&input, &out, EngineConfig::local().with_tasks(2).with_work_dir(dir.path().join("work")));
    assert!(litmr::io::is_committed(&out));
    assert!(read_sorted(&out).is_empty());
    assert_eq!(report.reduce.total_groups, 0);
}

#[test]
fn missing_input_is_reported_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));
    let err = run_stage(StageKind::Bigrams, "bigrams", &[dir.path().join("absent.txt")], &dir.path().join("out"), &cfg, &Collaborators::default())
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<litmr::Error>(), Some(litmr::Error::SourceUnavailable { .. })));
    assert!(!litmr::io::is_committed(dir.path().join("out")));
}

#[test]
fn rerunning_a_stage_replaces_its_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("text.txt");
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));

    fs::write(&input, "a b a b\n").unwrap();
    run_stage(StageKind::Bigrams, "bigrams", &[input.clone()], &out, &cfg, &Collaborators::default()).unwrap();
    assert_eq!(read_sorted(&out), vec!["a b\t2", "b a\t1"]);

    fs::write(&input, "c d\n").unwrap();
    run_stage(StageKind::Bigrams, "bigrams", &[input], &out, &cfg, &Collaborators::default()).unwrap();
    assert_eq!(read_sorted(&out), vec!["c d\t1"]);
}

#[test]
fn identical_lines_sum_per_lemma() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("books.tsv");
    fs::write(&input, "1,1885\tcut during certain region\n1,1885\tcut during certain region\n").unwrap();
    let out = dir.path().join("out");
    run_wordfreq(&input, &out, EngineConfig::local().with_tasks(2).with_split_bytes(8).with_work_dir(dir.path().join("work")));
    assert_eq!(read_sorted(&out), vec!["1,1885,certain\t2", "1,1885,cut\t2", "1,1885,during\t2", "1,1885,region\t2"]);
}

#[test]
fn sentiment_totals_combine_words_and_ignore_misses() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("counts.tsv");
    fs::write(&input, "1,1885,cut\t3\n1,1885,good\t1\n1,1885,region\t9\n2,1890,cut\t1\n").unwrap();
    let out = dir.path().join("out");
    let collab = Collaborators::default().with_lexicon(litmr::Lexicon::from_pairs([("cut", -1), ("good", 2)]));
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));
    let report = run_stage(StageKind::Sentiment, "sentiment", &[input], &out, &cfg, &collab).unwrap();
    assert_eq!(read_sorted(&out), vec!["1,1885\t-1", "2,1890\t-1"]);
    assert_eq!(report.map.skipped.lexicon_miss, 1);
}

#[test]
fn duplicate_catalog_keys_merge_into_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    fs::write(&catalog, "1,The Cut!,1885\n2,Other Book,1890\n1, A Whale ,1885\n").unwrap();
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_tasks(3).with_reducers(2).with_split_bytes(8).with_work_dir(dir.path().join("work"));
    let report = run_stage(StageKind::Normalize, "normalize", &[catalog], &out, &cfg, &Collaborators::default()).unwrap();
    assert_eq!(read_sorted(&out), vec!["1,1885\ta whale the cut", "2,1890\tother book"]);
    assert_eq!(report.reduce.total_groups, 2);
    assert_eq!(report.reduce.total_lines, 3);
}

#[test]
fn decade_totals_saturate_at_the_integer_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scores.tsv");
    fs::write(&input, "1,1885\t9223372036854775807\n2,1886\t1\n3,1891\t-9223372036854775808\n4,1892\t-1\n").unwrap();
    let cfg = EngineConfig::local().with_tasks(2).with_split_bytes(16).with_work_dir(dir.path().join("work"));
    for combine in [false, true] {
        let out = dir.path().join(format!("out-{combine}"));
        run_stage(StageKind::Trends, "trends", &[input.clone()], &out, &cfg.clone().with_combine(combine), &Collaborators::default()).unwrap();
        assert_eq!(
            read_sorted(&out),
            vec!["SentimentScore_Decade_1880\t9223372036854775807", "SentimentScore_Decade_1890\t-9223372036854775808"]
        );
    }
}
