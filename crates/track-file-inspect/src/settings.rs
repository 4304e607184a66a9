use clap::Parser;
use std::path::PathBuf;
use track_file_model::{ItemKind, PresentableItem};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Track File Inspect - Load a GPX file in the background and print its contents
pub struct Settings {
    /// GPX file to load
    #[clap(value_name = "FILE")]
    pub file: PathBuf,

    /// Print only the highlighted overlay of one item, as `track:<id>` or `waypoint:<id>`
    #[clap(long, value_name = "KIND:ID", value_parser = parse_item)]
    pub highlight: Option<PresentableItem>,

    /// Print overlay shapes instead of rows
    #[clap(long, default_value = "false")]
    pub overlay: bool,

    /// Print JSON instead of plain text
    #[clap(long, default_value = "false")]
    pub json: bool,

    /// Minimum progress advance to report (0.0-1.0)
    #[clap(long, default_value = "0.05")]
    pub progress_step: f64,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Whether overlay shapes should be printed
    pub fn wants_overlay(&self) -> bool {
        self.overlay || self.highlight.is_some()
    }
}

/// Parse `kind:id`, e.g. `track:0` or `wpt:3`
fn parse_item(s: &str) -> Result<PresentableItem, String> {
    let (kind, id) = s
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:ID, got {s:?}"))?;
    let kind: ItemKind = kind.parse()?;
    let id: usize = id
        .parse()
        .map_err(|e| format!("invalid item id {id:?}: {e}"))?;
    Ok(match kind {
        ItemKind::Track => PresentableItem::track(id),
        ItemKind::Waypoint => PresentableItem::waypoint(id),
    })
}
