//! End-to-end tests of background loading through the presentation model

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use track_file_model::{
    DataState, ItemKind, ModelEvent, OverlayKind, OverlayObject, OverlaySelection,
    PresentableItem, PresentationModel, Role, RoleValue, TrackColor,
};

const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="loading tests" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata>
    <name>Sample ride</name>
    <desc>Two tracks and three waypoints</desc>
  </metadata>
  <wpt lat="51.5074" lon="-0.1278">
    <ele>11.5</ele>
    <name>Start</name>
    <sym>Flag</sym>
  </wpt>
  <wpt lat="51.5080" lon="-0.1280">
    <name>Cafe</name>
  </wpt>
  <wpt lat="51.5090" lon="-0.1290"/>
  <trk>
    <name>Morning</name>
    <trkseg>
      <trkpt lat="51.5074" lon="-0.1278"/>
      <trkpt lat="51.5076" lon="-0.1276"/>
      <trkpt lat="51.5078" lon="-0.1274"/>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="51.5100" lon="-0.1300"/>
      <trkpt lat="51.5110" lon="-0.1310"/>
    </trkseg>
  </trk>
</gpx>
"#;

const SINGLE_TRACK_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="loading tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Evening</name>
    <trkseg>
      <trkpt lat="48.8566" lon="2.3522"/>
      <trkpt lat="48.8570" lon="2.3530"/>
    </trkseg>
  </trk>
</gpx>
"#;

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn write_temp_file(contents: &str) -> PathBuf {
    let n = FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "track-file-model-loading-{}-{}.gpx",
        std::process::id(),
        n
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

/// A single track with enough points to keep the parser busy for a while
fn large_gpx(points: usize) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="loading tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>Long</name><trkseg>
"#,
    );
    for i in 0..points {
        let lat = 45.0 + i as f64 * 1e-5;
        gpx.push_str(&format!(
            "    <trkpt lat=\"{lat:.6}\" lon=\"7.000000\"><ele>{i}</ele></trkpt>\n"
        ));
    }
    gpx.push_str("  </trkseg></trk>\n</gpx>\n");
    gpx
}

async fn next_event(rx: &mut broadcast::Receiver<ModelEvent>) -> ModelEvent {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for a model event")
        .expect("event channel closed or lagged")
}

/// Collect events up to and including the next `ParseFinished`
async fn wait_finished(rx: &mut broadcast::Receiver<ModelEvent>) -> Vec<ModelEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = matches!(event, ModelEvent::ParseFinished { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

fn finished_flags(events: &[ModelEvent]) -> (bool, bool) {
    match events.last() {
        Some(ModelEvent::ParseFinished { succeeded, aborted }) => (*succeeded, *aborted),
        other => panic!("expected ParseFinished, got {other:?}"),
    }
}

/// Events already queued, without waiting
fn pending(rx: &mut broadcast::Receiver<ModelEvent>) -> Vec<ModelEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn load(model: &PresentationModel, path: &PathBuf) -> Vec<ModelEvent> {
    let mut rx = model.subscribe();
    model.load_file(path);
    wait_finished(&mut rx).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_load_tracks_then_waypoints() {
    let path = write_temp_file(SAMPLE_GPX);
    let model = PresentationModel::new(Handle::current());

    let events = load(&model, &path).await;
    assert_eq!(finished_flags(&events), (true, false));
    assert_eq!(events[0], ModelEvent::LoadStarted { path: path.clone() });

    assert_eq!(model.data_state(), DataState::Loaded);
    assert!(model.file_valid());
    assert!(!model.parsing());
    assert_eq!(model.progress(), 1.0);
    assert_eq!(model.name(), "Sample ride");
    assert_eq!(model.description(), "Two tracks and three waypoints");
    assert_eq!(model.file_path(), Some(path));
    assert!(model.error_message().is_none());

    assert_eq!(model.row_count(), 5);
    let kinds: Vec<ItemKind> = (0..5).map(|row| model.get(row).unwrap().kind).collect();
    assert_eq!(
        kinds,
        vec![
            ItemKind::Track,
            ItemKind::Track,
            ItemKind::Waypoint,
            ItemKind::Waypoint,
            ItemKind::Waypoint
        ]
    );
    assert_eq!(model.item(2), Some(PresentableItem::waypoint(0)));

    let first = model.get(0).unwrap();
    assert_eq!(first.name, "Morning");
    assert!(first.length > 0.0);

    // Unnamed items fall back to their id
    assert_eq!(model.get(1).unwrap().name, "Track 1");
    assert_eq!(model.get(4).unwrap().name, "Waypoint 2");

    assert_eq!(
        model.data(2, Role::Symbol),
        Some(RoleValue::Text("Flag".to_string()))
    );
    assert_eq!(
        model.data(2, Role::Elevation).and_then(|v| v.as_f64()),
        Some(11.5)
    );
    assert_eq!(
        model.data(3, Role::Lat).and_then(|v| v.as_f64()),
        Some(51.5080)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rows_out_of_range() {
    let path = write_temp_file(SAMPLE_GPX);
    let model = PresentationModel::new(Handle::current());
    load(&model, &path).await;

    assert!(model.get(5).is_none());
    assert!(model.get(usize::MAX).is_none());
    assert!(model.data(5, Role::Name).is_none());
    assert!(model.item(5).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_is_monotonic_and_completes() {
    let path = write_temp_file(&large_gpx(2_000));
    let model = PresentationModel::new(Handle::current());

    let events = load(&model, &path).await;
    let progress: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            ModelEvent::ProgressChanged(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress.first().copied(), Some(0.0));
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_file_fails() {
    let model = PresentationModel::new(Handle::current());
    let path = std::env::temp_dir().join("track-file-model-does-not-exist.gpx");

    let events = load(&model, &path).await;
    assert_eq!(finished_flags(&events), (false, false));
    assert_eq!(model.data_state(), DataState::Failed);
    assert!(model.failure());
    assert!(!model.file_valid());
    assert!(!model.parsing());
    assert_eq!(model.row_count(), 0);
    assert!(model.error_message().is_some_and(|m| !m.is_empty()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_corrupt_file_fails() {
    let path = write_temp_file("<gpx><trk><trkseg><trkpt lat=");
    let model = PresentationModel::new(Handle::current());

    let events = load(&model, &path).await;
    assert_eq!(finished_flags(&events), (false, false));
    assert_eq!(model.data_state(), DataState::Failed);
    assert_eq!(model.row_count(), 0);
    assert!(
        model
            .create_overlay_objects(OverlaySelection::All)
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_reload_discards_previous_items() {
    let good = write_temp_file(SAMPLE_GPX);
    let bad = write_temp_file("not a gpx file at all");
    let model = PresentationModel::new(Handle::current());

    load(&model, &good).await;
    assert_eq!(model.row_count(), 5);

    let events = load(&model, &bad).await;
    assert_eq!(finished_flags(&events), (false, false));
    assert!(events.contains(&ModelEvent::CountChanged(0)));
    assert_eq!(model.data_state(), DataState::Failed);
    assert_eq!(model.row_count(), 0);
    assert_eq!(model.name(), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_load_supersedes_first() {
    let first = write_temp_file(&large_gpx(20_000));
    let second = write_temp_file(SINGLE_TRACK_GPX);
    let model = PresentationModel::new(Handle::current());
    let mut rx = model.subscribe();

    model.load_file(&first);
    model.load_file(&second);

    // Skip whatever the first load managed to publish
    loop {
        if next_event(&mut rx).await
            == (ModelEvent::LoadStarted {
                path: second.clone(),
            })
        {
            break;
        }
    }
    let events = wait_finished(&mut rx).await;
    assert_eq!(finished_flags(&events), (true, false));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let late = pending(&mut rx);
    assert!(
        !late
            .iter()
            .any(|event| matches!(event, ModelEvent::ParseFinished { .. })),
        "stray completion: {late:?}"
    );

    assert_eq!(model.row_count(), 1);
    assert_eq!(model.get(0).unwrap().name, "Evening");
    assert_eq!(model.file_path(), Some(second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_during_load_stays_blank() {
    let path = write_temp_file(&large_gpx(20_000));
    let model = PresentationModel::new(Handle::current());
    let mut rx = model.subscribe();

    model.load_file(&path);
    model.clear_data();

    loop {
        if next_event(&mut rx).await == ModelEvent::Cleared {
            break;
        }
    }
    assert!(!model.parsing());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(pending(&mut rx).is_empty());
    assert_eq!(model.data_state(), DataState::Blank);
    assert_eq!(model.row_count(), 0);
    assert!(model.file_path().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_load() {
    let path = write_temp_file(&large_gpx(50_000));
    let model = PresentationModel::new(Handle::current());
    let mut rx = model.subscribe();

    model.load_file(&path);
    model.cancel_load();

    let events = wait_finished(&mut rx).await;
    let (succeeded, aborted) = finished_flags(&events);
    assert!(!model.parsing());
    assert!(!model.failure());
    assert!(model.error_message().is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let late = pending(&mut rx);
    assert!(
        !late.iter().any(|event| matches!(
            event,
            ModelEvent::ProgressChanged(_) | ModelEvent::ParseFinished { .. }
        )),
        "event after completion: {late:?}"
    );

    if aborted {
        assert!(!succeeded);
        assert!(late.is_empty(), "event after abort: {late:?}");
        assert_eq!(model.data_state(), DataState::Blank);
        assert_eq!(model.row_count(), 0);
    } else {
        // The parser finished before it saw the request
        assert!(succeeded);
        assert_eq!(model.row_count(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_then_reload() {
    let first = write_temp_file(&large_gpx(50_000));
    let second = write_temp_file(SINGLE_TRACK_GPX);
    let model = PresentationModel::new(Handle::current());
    let mut rx = model.subscribe();

    model.load_file(&first);
    model.cancel_load();
    model.load_file(&second);

    loop {
        if next_event(&mut rx).await
            == (ModelEvent::LoadStarted {
                path: second.clone(),
            })
        {
            break;
        }
    }
    let events = wait_finished(&mut rx).await;
    assert_eq!(finished_flags(&events), (true, false));

    // The cancelled job's completion belongs to an older load and is dropped
    tokio::time::sleep(Duration::from_millis(300)).await;
    let late = pending(&mut rx);
    assert!(
        !late
            .iter()
            .any(|event| matches!(event, ModelEvent::ParseFinished { .. })),
        "stray completion: {late:?}"
    );

    assert!(!model.parsing());
    assert_eq!(model.data_state(), DataState::Loaded);
    assert_eq!(model.row_count(), 1);
    assert_eq!(model.get(0).unwrap().name, "Evening");
    assert_eq!(model.file_path(), Some(second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlays() {
    let path = write_temp_file(SAMPLE_GPX);
    let model = PresentationModel::new(Handle::current());
    load(&model, &path).await;

    let all = model.create_overlay_objects(OverlaySelection::All);
    assert_eq!(all.len(), 5);
    assert_eq!(
        all.iter()
            .filter(|o| o.kind() == OverlayKind::TrackLine)
            .count(),
        2
    );
    assert_eq!(
        all.iter()
            .filter(|o| o.kind() == OverlayKind::WaypointMarker)
            .count(),
        3
    );
    let OverlayObject::Line(line) = &all[0] else {
        panic!("expected a line first");
    };
    assert_eq!(line.geometry.0.len(), 3);

    let highlighted =
        model.create_overlay_objects(OverlaySelection::Item(PresentableItem::track(0)));
    assert_eq!(highlighted.len(), 1);
    assert!(highlighted[0].is_highlighted());
    assert_eq!(highlighted[0].type_name(), "_highlighted");

    let waypoint =
        model.create_overlay_objects(OverlaySelection::Item(PresentableItem::waypoint(2)));
    assert!(matches!(
        waypoint.as_slice(),
        [OverlayObject::Point(p)] if p.kind == OverlayKind::Highlighted
    ));

    assert!(
        model
            .create_overlay_objects(OverlaySelection::Item(PresentableItem::track(2)))
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_track_colors_are_deterministic() {
    let path = write_temp_file(SAMPLE_GPX);
    let model = PresentationModel::new(Handle::current());

    load(&model, &path).await;
    let first_load: Vec<Option<RoleValue>> = (0..2)
        .map(|row| model.data(row, Role::DisplayColor))
        .collect();
    load(&model, &path).await;
    let second_load: Vec<Option<RoleValue>> = (0..2)
        .map(|row| model.data(row, Role::DisplayColor))
        .collect();

    assert_eq!(first_load, second_load);
    assert_eq!(
        first_load[0],
        Some(RoleValue::Text(TrackColor::from_index(0).to_hex()))
    );
    assert_ne!(first_load[0], first_load[1]);
    // Waypoints carry no color
    assert_eq!(
        model.data(2, Role::DisplayColor),
        Some(RoleValue::Text(String::new()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_outlives_reload() {
    let first = write_temp_file(SAMPLE_GPX);
    let second = write_temp_file(SINGLE_TRACK_GPX);
    let model = PresentationModel::new(Handle::current());

    load(&model, &first).await;
    let snapshot = model.snapshot();
    load(&model, &second).await;

    assert_eq!(snapshot.row_count(), 5);
    assert_eq!(snapshot.data_state(), DataState::Loaded);
    assert_eq!(snapshot.get(0).unwrap().name, "Morning");
    assert_eq!(model.row_count(), 1);
}
