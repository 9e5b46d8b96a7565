//! Session-level persistence tests.
//!
//! Drive `ScriptSession` through save/resume cycles against the pendulum
//! fixture and verify that progress, the selected page and failure handling
//! survive the round trip through the state file.

use std::fs;

use lablet::core::bundle::Bundle;
use lablet::core::component::ComponentKind;
use lablet::core::error::ScriptError;
use lablet::core::persistence::{CURRENT_FRAGMENT_KEY, SCRIPT_ID_KEY, SCRIPT_NAME_KEY};
use lablet::core::state::ComponentState;
use lablet::core::types::{ComponentPath, Interaction};
use lablet::io::config::LabletConfig;
use lablet::io::source::JsonScriptLoader;
use lablet::io::state_store::{load_state_file, write_state_file};
use lablet::session::ScriptSession;
use lablet::test_support::pendulum_fixture;

fn loader() -> JsonScriptLoader {
    JsonScriptLoader::new().expect("loader")
}

/// Progress made across several pages is identical after resuming.
#[test]
fn resumed_run_matches_saved_run() {
    let (temp, script_path) = pendulum_fixture();
    let run_dir = temp.path().join("run");
    let cfg = LabletConfig::default();

    let mut session =
        ScriptSession::start_new(&loader(), &cfg, &script_path, &run_dir).expect("start");
    let tree = session.script().tree();
    let intro = tree.find_by_name("Intro").expect("intro");
    let swing = tree.find_by_name("swing").expect("swing");
    let analysis = tree.find_by_name("Analysis").expect("analysis");

    session
        .interact(&ComponentPath::item(intro, vec![2]), Interaction::SetChecked(true))
        .expect("tick");
    let video = temp.path().join("swing.mp4");
    fs::write(&video, b"frames").expect("write video");
    session
        .record_experiment(&ComponentPath::node(swing), &video)
        .expect("record");
    session
        .interact(
            &ComponentPath::item(analysis, vec![2]),
            Interaction::SetAnswer("1.9 s".to_string()),
        )
        .expect("answer");
    session.go_to_page(2).expect("page");
    session.save().expect("save");

    let saved_tree = session.script().tree().clone();
    drop(session);

    let resumed = ScriptSession::resume(&loader(), &cfg, &run_dir).expect("resume");
    assert_eq!(resumed.script().tree(), &saved_tree);
    assert_eq!(resumed.current_page(), 2);
    assert!(resumed.is_complete());

    let ComponentKind::Experiment(experiment) = resumed
        .script()
        .tree()
        .component(swing)
        .expect("swing")
        .kind()
    else {
        panic!("expected experiment");
    };
    let recording = run_dir.join(experiment.path().expect("recorded"));
    assert!(recording.join("swing.mp4").exists());
}

#[test]
fn state_file_carries_envelope() {
    let (temp, script_path) = pendulum_fixture();
    let run_dir = temp.path().join("run");
    let cfg = LabletConfig::default();
    let mut session =
        ScriptSession::start_new(&loader(), &cfg, &script_path, &run_dir).expect("start");
    session.save().expect("save");

    let bundle = load_state_file(&session.paths().state_path).expect("load");
    assert_eq!(bundle.get_string(SCRIPT_NAME_KEY), Some("pendulum.json"));
    assert_eq!(bundle.get_int(CURRENT_FRAGMENT_KEY), Some(0));
    assert!(bundle.get_string(SCRIPT_ID_KEY).is_some());
    for id in 0..4 {
        assert!(bundle.contains_key(&id.to_string()), "component {id}");
    }
    assert!(!bundle.contains_key("4"));
}

/// A damaged state file aborts the resume without touching the file.
#[test]
fn missing_component_state_aborts_resume() {
    let (temp, script_path) = pendulum_fixture();
    let run_dir = temp.path().join("run");
    let cfg = LabletConfig::default();
    let mut session =
        ScriptSession::start_new(&loader(), &cfg, &script_path, &run_dir).expect("start");
    session.save().expect("save");
    let state_path = session.paths().state_path.clone();
    drop(session);

    let mut bundle = load_state_file(&state_path).expect("load");
    bundle.remove("3");
    write_state_file(&state_path, &bundle).expect("write");

    let err = ScriptSession::resume(&loader(), &cfg, &run_dir)
        .err()
        .expect("missing state");
    assert_eq!(
        err.downcast_ref::<ScriptError>(),
        Some(&ScriptError::MissingComponentState { id: 3 })
    );
    assert_eq!(load_state_file(&state_path).expect("reload"), bundle);
}

#[test]
fn out_of_range_page_is_clamped_on_resume() {
    let (temp, script_path) = pendulum_fixture();
    let run_dir = temp.path().join("run");
    let cfg = LabletConfig::default();
    let mut session =
        ScriptSession::start_new(&loader(), &cfg, &script_path, &run_dir).expect("start");
    session.save().expect("save");
    let state_path = session.paths().state_path.clone();
    drop(session);

    let mut bundle: Bundle = load_state_file(&state_path).expect("load");
    bundle.put_int(CURRENT_FRAGMENT_KEY, 7);
    write_state_file(&state_path, &bundle).expect("write");

    let resumed = ScriptSession::resume(&loader(), &cfg, &run_dir).expect("resume");
    assert_eq!(resumed.current_page(), 0);
    assert_eq!(
        resumed
            .script()
            .tree()
            .component(resumed.current_component().expect("page"))
            .expect("component")
            .state(),
        ComponentState::Ongoing
    );
}
