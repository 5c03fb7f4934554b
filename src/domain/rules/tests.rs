// Unit tests for clip planning rules

use std::path::PathBuf;

use super::*;

fn scenario_catalog() -> Catalog {
    Catalog::new(
        "https://www.youtube.com/watch?v=abc",
        Some("My: Video?".to_string()),
        Some(TimeSpec::from_seconds(212.0)),
        vec![
            FormatEntry::new("137", "mp4", true, false)
                .with_resolution(1920, 1080)
                .with_fps(30.0)
                .with_codecs(Some("avc1.640028"), None),
            FormatEntry::new("140", "m4a", false, true)
                .with_audio_bitrate(129.5)
                .with_codecs(None, Some("mp4a.40.2")),
            FormatEntry::new("18", "mp4", true, true)
                .with_resolution(640, 360)
                .with_fps(30.0)
                .with_codecs(Some("avc1.42001E"), Some("mp4a.40.2")),
        ],
    )
}

fn silent_catalog() -> Catalog {
    Catalog::new(
        "https://www.youtube.com/watch?v=silent",
        None,
        None,
        vec![
            FormatEntry::new("248", "webm", true, false).with_codecs(Some("vp9"), None),
            FormatEntry::new("137", "mp4", true, false).with_codecs(Some("avc1"), None),
        ],
    )
}

fn range(start: f64, end: f64) -> TimeRange {
    TimeRange::from_seconds(start, end).unwrap()
}

#[test]
fn test_pre_merged_format_uses_single_selector() {
    let catalog = scenario_catalog();
    let plan = ClipPlanner::default()
        .plan(&catalog, "18", range(0.0, 30.0))
        .unwrap();

    assert_eq!(plan.selectors, vec!["18".to_string()]);
    assert_eq!(plan.kind, PlanKind::PreMerged);
    assert_eq!(plan.range, range(0.0, 30.0));
    assert_eq!(plan.container, OutputContainer::Mkv);
    assert_eq!(plan.catalog_id, catalog.id());
    assert!(!plan.needs_merge());
}

#[test]
fn test_video_only_format_pairs_best_audio() {
    let catalog = scenario_catalog();
    let plan = ClipPlanner::default()
        .plan(&catalog, "137", range(10.0, 20.0))
        .unwrap();

    assert_eq!(plan.selectors, vec!["137".to_string(), "140".to_string()]);
    assert_eq!(plan.kind, PlanKind::PairedAudio);
    assert_eq!(plan.format_spec(), "137+140");
    assert_eq!(plan.range, range(10.0, 20.0));
    assert!(plan.needs_merge());
}

#[test]
fn test_audio_override_replaces_best_audio() {
    let mut entries = scenario_catalog().entries().to_vec();
    entries.push(
        FormatEntry::new("251", "webm", false, true)
            .with_audio_bitrate(135.0)
            .with_codecs(None, Some("opus")),
    );
    let catalog = Catalog::new("https://www.youtube.com/watch?v=abc", None, None, entries);
    let planner = ClipPlanner::default();

    let plan = planner
        .plan_with_audio(&catalog, "137", Some("251"), range(0.0, 5.0))
        .unwrap();
    assert_eq!(plan.format_spec(), "137+251");
    assert_eq!(plan.kind, PlanKind::PairedAudio);

    let plan = planner
        .plan_with_audio(&catalog, "137", None, range(0.0, 5.0))
        .unwrap();
    assert_eq!(plan.format_spec(), "137+140");
}

#[test]
fn test_audio_override_must_be_audio_only() {
    let catalog = scenario_catalog();
    let planner = ClipPlanner::default();

    let err = planner
        .plan_with_audio(&catalog, "137", Some("999"), range(0.0, 5.0))
        .unwrap_err();
    assert_eq!(err, PlanError::UnknownFormat("999".to_string()));

    let err = planner
        .plan_with_audio(&catalog, "137", Some("18"), range(0.0, 5.0))
        .unwrap_err();
    assert_eq!(err, PlanError::NotAudioOnly("18".to_string()));

    let err = planner
        .plan_with_audio(&catalog, "18", Some("140"), range(0.0, 5.0))
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::AudioNotPairable {
            format_id: "18".to_string()
        }
    );
}

#[test]
fn test_audio_override_pairs_with_silent_catalog_only_when_listed() {
    let err = ClipPlanner::default()
        .plan_between_with_audio(
            &silent_catalog(),
            "248",
            Some("137"),
            TimeSpec::from_seconds(0.0),
            TimeSpec::from_seconds(5.0),
        )
        .unwrap_err();
    assert_eq!(err, PlanError::NotAudioOnly("137".to_string()));
}

#[test]
fn test_reversed_range_is_invalid() {
    let catalog = scenario_catalog();
    let err = ClipPlanner::default()
        .plan_between(
            &catalog,
            "137",
            TimeSpec::from_seconds(20.0),
            TimeSpec::from_seconds(10.0),
        )
        .unwrap_err();
    assert!(matches!(err, PlanError::InvalidRange { .. }));
}

#[test]
fn test_unknown_format_wins_over_invalid_range() {
    let catalog = scenario_catalog();
    let planner = ClipPlanner::default();

    let err = planner
        .plan_between(
            &catalog,
            "999",
            TimeSpec::from_seconds(20.0),
            TimeSpec::from_seconds(10.0),
        )
        .unwrap_err();
    assert_eq!(err, PlanError::UnknownFormat("999".to_string()));

    let err = planner.plan(&catalog, "999", range(0.0, 1.0)).unwrap_err();
    assert_eq!(err, PlanError::UnknownFormat("999".to_string()));
}

#[test]
fn test_video_only_without_audio_is_rejected() {
    let catalog = silent_catalog();
    assert_eq!(catalog.best_audio(), None);

    let err = ClipPlanner::default()
        .plan(&catalog, "248", range(0.0, 5.0))
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::NoAudioAvailable {
            format_id: "248".to_string()
        }
    );
}

#[test]
fn test_audio_only_format_produces_audio_container() {
    let catalog = scenario_catalog();
    let plan = ClipPlanner::default()
        .plan(&catalog, "140", range(1.0, 2.0))
        .unwrap();

    assert_eq!(plan.selectors, vec!["140".to_string()]);
    assert_eq!(plan.kind, PlanKind::AudioOnly);
    assert_eq!(plan.container, OutputContainer::Mka);
    assert_eq!(
        plan.output_path.extension().and_then(|e| e.to_str()),
        Some("mka")
    );
}

#[test]
fn test_preferred_container_kept_when_codecs_fit() {
    let planner = ClipPlanner::new(PlannerSettings {
        preferred_container: OutputContainer::Mp4,
        output_dir: PathBuf::from("clips"),
    });
    let plan = planner
        .plan(&scenario_catalog(), "137", range(0.0, 5.0))
        .unwrap();

    assert_eq!(plan.container, OutputContainer::Mp4);
    assert!(plan.output_path.starts_with("clips"));
}

#[test]
fn test_preferred_container_falls_back_to_mkv() {
    let catalog = Catalog::new(
        "u",
        None,
        None,
        vec![
            FormatEntry::new("248", "webm", true, false).with_codecs(Some("vp9"), None),
            FormatEntry::new("140", "m4a", false, true).with_codecs(None, Some("mp4a.40.2")),
        ],
    );
    let planner = ClipPlanner::new(PlannerSettings {
        preferred_container: OutputContainer::Webm,
        ..PlannerSettings::default()
    });

    let plan = planner.plan(&catalog, "248", range(0.0, 5.0)).unwrap();
    assert_eq!(plan.container, OutputContainer::Mkv);
}

#[test]
fn test_default_output_path_uses_sanitized_title() {
    let plan = ClipPlanner::default()
        .plan(&scenario_catalog(), "18", range(10.0, 20.0))
        .unwrap();
    let name = plan.output_path.file_name().unwrap().to_string_lossy().to_string();

    assert_eq!(name, "My Video_clip_10s000ms_20s000ms.mkv");
}

#[test]
fn test_with_output_path_forces_container_extension() {
    let plan = ClipPlanner::default()
        .plan(&scenario_catalog(), "18", range(0.0, 1.0))
        .unwrap()
        .with_output_path("/tmp/out/final.mp4");
    assert_eq!(plan.output_path, PathBuf::from("/tmp/out/final.mkv"));
}

#[test]
fn test_listing_orders_video_by_height_then_audio() {
    let listing = FormatLister::list(&scenario_catalog());
    let ids: Vec<&str> = listing.iter().map(|l| l.id.as_str()).collect();

    assert_eq!(ids, vec!["137", "18", "140"]);
    assert_eq!(listing[0].label, "1080p (30fps, mp4) (Video Only)");
    assert_eq!(listing[1].label, "360p (30fps, mp4) (Video+Audio)");
    assert_eq!(listing[2].label, "130k (mp4a.40.2, m4a)");
}
