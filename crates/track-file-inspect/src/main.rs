//! Track File Inspect - Command line consumer of track-file-model
//!
//! Loads one GPX file through a [`PresentationModel`], reports progress on stderr and
//! prints the resulting rows or overlay shapes on stdout.

mod logging;
mod settings;

use settings::Settings;
use std::process::ExitCode;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use track_file_model::{
    DataState, ItemKind, ItemRecord, ModelConfig, ModelEvent, OverlayObject, OverlaySelection,
    PresentationModel,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(settings)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the file and print it; `Ok(false)` when the file could not be loaded
async fn run(settings: Settings) -> Result<bool, BoxError> {
    let config = ModelConfig {
        progress_step: settings.progress_step,
        ..ModelConfig::default()
    };
    let model = PresentationModel::with_config(Handle::current(), config);
    let mut events = model.subscribe();
    model.load_file(&settings.file);

    loop {
        match events.recv().await {
            Ok(ModelEvent::ProgressChanged(progress)) => {
                if !settings.json {
                    eprintln!("Loading {:>5.1}%", progress * 100.0);
                }
            }
            Ok(ModelEvent::ParseFinished { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} model events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    if model.data_state() != DataState::Loaded {
        let message = model
            .error_message()
            .unwrap_or_else(|| "load did not complete".to_string());
        eprintln!("Could not load {}: {}", settings.file.display(), message);
        return Ok(false);
    }

    if settings.wants_overlay() {
        let selection = settings
            .highlight
            .map_or(OverlaySelection::All, OverlaySelection::Item);
        let objects = model.create_overlay_objects(selection);
        if settings.json {
            println!("{}", serde_json::to_string_pretty(&objects)?);
        } else {
            print_overlays(&objects);
        }
    } else {
        let records: Vec<ItemRecord> = (0..model.row_count())
            .filter_map(|row| model.get(row))
            .collect();
        if settings.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            print_rows(&model, &records);
        }
    }
    Ok(true)
}

fn print_rows(model: &PresentationModel, records: &[ItemRecord]) {
    let name = model.name();
    if !name.is_empty() {
        println!("{name}");
    }
    let description = model.description();
    if !description.is_empty() {
        println!("{description}");
    }

    for (row, record) in records.iter().enumerate() {
        match record.kind {
            ItemKind::Track => println!(
                "{row:>4}  track     {:<24} {:>10.1} m  {}",
                record.name, record.length, record.display_color
            ),
            ItemKind::Waypoint => println!(
                "{row:>4}  waypoint  {:<24} {:>10.6}, {:>11.6}  {:>7.1} m  {}",
                record.name, record.lat, record.lon, record.elevation, record.symbol
            ),
        }
    }
    println!("{} rows", records.len());
}

fn print_overlays(objects: &[OverlayObject]) {
    for object in objects {
        match object {
            OverlayObject::Line(line) => println!(
                "{:<13} {:<14} {:<24} {} points  {}",
                line.kind.type_name(),
                format!("{}:{}", line.item.kind, line.item.id),
                line.name,
                line.geometry.0.len(),
                line.color
            ),
            OverlayObject::Point(point) => println!(
                "{:<13} {:<14} {:<24} {:.6}, {:.6}  {}",
                point.kind.type_name(),
                format!("{}:{}", point.item.kind, point.item.id),
                point.name,
                point.position.y(),
                point.position.x(),
                point.symbol
            ),
        }
    }
    println!("{} shapes", objects.len());
}
