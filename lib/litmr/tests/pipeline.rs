use litmr::io::{is_committed, list_input_files};
use litmr::{ArtifactFormat, Collaborators, EngineConfig, Lexicon, Pipeline, PipelineOptions, StageKind, StageSpec, StageStatus, TableLemmatizer};
use std::fs;
use std::path::Path;

fn read_sorted(dir: &Path) -> Vec<String> {
    let mut lines: Vec<String> = list_input_files(dir)
        .unwrap()
        .iter()
        .flat_map(|p| fs::read_to_string(p).unwrap().lines().map(String::from).collect::<Vec<_>>())
        .collect();
    lines.sort();
    lines
}

fn write_catalog(dir: &Path) -> std::path::PathBuf {
    let catalog = dir.join("catalog.csv");
    fs::write(&catalog, "1,The Cut!,1885\n2,Cut during,1899\n\n3,Moby Dick, or The Whale,1851\n").unwrap();
    catalog
}

fn collaborators() -> Collaborators { Collaborators::default().with_lexicon(Lexicon::from_pairs([("cut", -1)])) }

#[test]
fn standard_pipeline_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_tasks(2).with_work_dir(dir.path().join("work"));

    let report = Pipeline::standard(&catalog, &out).run(&cfg, &collaborators(), PipelineOptions::default()).unwrap();
    assert_eq!(report.stages.len(), 6);
    assert!(report.stages.iter().all(|s| matches!(s.status, StageStatus::Ran(_))));

    assert_eq!(read_sorted(&out.join("normalized")), vec!["1,1885\tthe cut", "2,1899\tcut during"]);
    assert_eq!(
        read_sorted(&out.join("wordfreq")),
        vec!["1,1885,cut\t1", "1,1885,the\t1", "2,1899,cut\t1", "2,1899,during\t1"]
    );
    assert_eq!(read_sorted(&out.join("sentiment")), vec!["1,1885\t-1", "2,1899\t-1"]);
    assert_eq!(read_sorted(&out.join("bigram_prep")), vec!["1,1885\tcut the", "2,1899\tcut during"]);
    assert_eq!(read_sorted(&out.join("bigrams")), vec!["cut during\t1", "cut the\t1"]);
    assert_eq!(
        read_sorted(&out.join("trends")),
        vec![
            "SentimentScore_Decade_1880\t-1",
            "SentimentScore_Decade_1890\t-1",
            "WordFrequency_Decade_1880\t2",
            "WordFrequency_Decade_1890\t2",
        ]
    );
    for stage in ["normalized", "wordfreq", "sentiment", "bigram_prep", "bigrams", "trends"] {
        assert!(is_committed(out.join(stage)), "{stage}");
    }

    let normalize = report.stage("normalize").unwrap();
    let StageStatus::Ran(stats) = &normalize.status else { panic!("normalize did not run") };
    assert_eq!(stats.map.skipped.field_count, 1);
    assert_eq!(stats.map.skipped.blank, 1);
}

#[test]
fn lemmatizer_merges_inflected_forms() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("books.tsv");
    fs::write(&text, "1,1885\tcutting cut Cuts\n").unwrap();
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));
    let collab = Collaborators::default().with_lemmatizer(TableLemmatizer::from_pairs([("cutting", "cut"), ("cuts", "cut")]));

    Pipeline::new()
        .stage(StageSpec::new("wordfreq", StageKind::WordFrequency, out.join("wf")).reads_external(&text, ArtifactFormat::BookText))
        .run(&cfg, &collab, PipelineOptions::default())
        .unwrap();
    assert_eq!(read_sorted(&out.join("wf")), vec!["1,1885,cut\t3"]);
}

#[test]
fn resume_reuses_committed_stages_and_reruns_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let out = dir.path().join("out");
    let work = dir.path().join("work");
    let pipeline = Pipeline::standard(&catalog, &out);
    let resume = PipelineOptions { resume: true };

    pipeline.run(&EngineConfig::local().with_work_dir(&work), &collaborators(), resume).unwrap();

    let second = pipeline.run(&EngineConfig::local().with_work_dir(&work), &collaborators(), resume).unwrap();
    assert!(second.stages.iter().all(|s| matches!(s.status, StageStatus::Reused)));

    // Uncommitting the middle of the graph re-runs it and everything downstream.
    fs::remove_file(out.join("sentiment").join("_SUCCESS")).unwrap();
    let third = pipeline.run(&EngineConfig::local().with_work_dir(&work), &collaborators(), resume).unwrap();
    let ran: Vec<&str> = third
        .stages
        .iter()
        .filter(|s| matches!(s.status, StageStatus::Ran(_)))
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(ran, vec!["sentiment", "trends"]);
    assert_eq!(read_sorted(&out.join("sentiment")), vec!["1,1885\t-1", "2,1899\t-1"]);
}

#[test]
fn resume_rebuilds_an_upstream_without_a_commit_marker() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));
    let text = dir.path().join("books.tsv");
    fs::write(&text, "1,1885\tcut\n").unwrap();

    let pipeline = Pipeline::new()
        .stage(StageSpec::new("wordfreq", StageKind::WordFrequency, out.join("wf")).reads_external(&text, ArtifactFormat::BookText))
        .stage(StageSpec::new("sentiment", StageKind::Sentiment, out.join("s")).reads_stage("wordfreq"));
    pipeline.run(&cfg, &collaborators(), PipelineOptions::default()).unwrap();

    // A half-written upstream: part files present, marker absent.
    fs::remove_file(out.join("wf").join("_SUCCESS")).unwrap();
    let report = pipeline.run(&cfg, &collaborators(), PipelineOptions { resume: true }).unwrap();
    assert!(matches!(report.stage("wordfreq").unwrap().status, StageStatus::Ran(_)));
    assert!(matches!(report.stage("sentiment").unwrap().status, StageStatus::Ran(_)));
    assert_eq!(read_sorted(&out.join("s")), vec!["1,1885\t-1"]);
}

#[test]
fn handoffs_are_rewritten_into_the_consumer_format() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("books.tsv");
    fs::write(&text, "1,1885\tcut the cut\n2,1899\tthe cut\n").unwrap();
    let out = dir.path().join("out");
    let cfg = EngineConfig::local().with_work_dir(dir.path().join("work")).with_keep_intermediates(true);

    Pipeline::new()
        .stage(StageSpec::new("bigrams", StageKind::Bigrams, out.join("bigrams")).reads_external(&text, ArtifactFormat::BookText))
        .run(&cfg, &Collaborators::default(), PipelineOptions::default())
        .unwrap();

    let handoff = cfg.stage_work_dir("bigrams").join("handoff_0");
    assert!(is_committed(&handoff));
    assert_eq!(read_sorted(&handoff), vec!["cut the cut", "the cut"]);
    assert_eq!(read_sorted(&out.join("bigrams")), vec!["cut the\t1", "the cut\t2"]);
}
