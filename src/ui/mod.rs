//! egui widgets. Panels mutate the session through [`AppState`] methods;
//! plots only read it.
//!
//! [`AppState`]: crate::state::AppState

pub mod panels;
pub mod plot;

use crate::color::TracePalette;
use crate::config::Settings;
use crate::data::export::ExportFormat;

/// Which run series the lower plot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesView {
    Centroid,
    Intensity,
    Minimum,
    AreaRatio,
    BandIntensity,
    BandArea,
}

impl SeriesView {
    pub const ALL: [SeriesView; 6] = [
        SeriesView::Centroid,
        SeriesView::Intensity,
        SeriesView::Minimum,
        SeriesView::AreaRatio,
        SeriesView::BandIntensity,
        SeriesView::BandArea,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SeriesView::Centroid => "Centroid",
            SeriesView::Intensity => "Intensity",
            SeriesView::Minimum => "Minimum",
            SeriesView::AreaRatio => "Area ratio",
            SeriesView::BandIntensity => "Band intensity ratio",
            SeriesView::BandArea => "Band area ratio",
        }
    }
}

/// Widget state that is not part of the session.
pub struct UiState {
    /// Settings being edited; applied on demand.
    pub draft: Settings,
    pub export_format: ExportFormat,
    pub series_view: SeriesView,
    pub minmax_scaling: bool,
    pub palette: TracePalette,
}

impl UiState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            draft: settings.clone(),
            export_format: ExportFormat::Csv,
            series_view: SeriesView::Centroid,
            minmax_scaling: false,
            palette: TracePalette::default(),
        }
    }
}
