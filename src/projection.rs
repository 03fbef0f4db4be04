//! End-to-end projection: decompose, forecast, reconstruct, simulate.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::{ForecastedSeries, RatePanel};
use crate::decomposition::{Decomposition, FactorDecomposer, ReconstructionMode};
use crate::error::{ProjectionError, Result};
use crate::models::{ForecastConfig, SeriesForecaster};
use crate::simulation::{PercentileBand, SimulationConfig, UncertaintySimulator, UncertaintyTarget};

/// Settings for a full projection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Components retained by the decomposition.
    pub components: usize,
    /// Components used for reconstruction and forecasting.
    pub mode: ReconstructionMode,
    /// Number of future periods.
    pub horizon: usize,
    /// Time-factor model settings.
    pub forecast: ForecastConfig,
    /// Monte Carlo settings; `None` skips the uncertainty bands.
    pub simulation: Option<SimulationConfig>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            components: 1,
            mode: ReconstructionMode::default(),
            horizon: 10,
            forecast: ForecastConfig::default(),
            simulation: None,
        }
    }
}

impl ProjectionConfig {
    /// Classical single-component projection over `horizon` periods.
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            ..Default::default()
        }
    }

    pub fn with_components(mut self, components: usize) -> Self {
        self.components = components;
        self
    }

    pub fn with_mode(mut self, mode: ReconstructionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastConfig) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = Some(simulation);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.components == 0 {
            return Err(ProjectionError::Configuration(
                "at least one component is required".to_string(),
            ));
        }
        if self.horizon == 0 {
            return Err(ProjectionError::Configuration(
                "projection horizon must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a projection run derives from one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    decomposition: Decomposition,
    time_factors: ForecastedSeries,
    fitted_rates: RatePanel,
    forecast_rates: RatePanel,
    bands: Vec<PercentileBand>,
}

impl Projection {
    /// Decomposition with every retained component.
    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    /// Time factors of the components used for reconstruction, history
    /// followed by forecasts.
    pub fn time_factors(&self) -> &ForecastedSeries {
        &self.time_factors
    }

    /// Rates implied by the model over the observed periods.
    pub fn fitted_rates(&self) -> &RatePanel {
        &self.fitted_rates
    }

    /// Point-forecast rates for the future periods only.
    pub fn forecast_rates(&self) -> &RatePanel {
        &self.forecast_rates
    }

    /// Percentile bands, empty when simulation was not requested.
    pub fn bands(&self) -> &[PercentileBand] {
        &self.bands
    }

    /// Band for a series label (`component <c>` or a category name).
    pub fn band(&self, label: &str) -> Option<&PercentileBand> {
        self.bands.iter().find(|b| b.label() == label)
    }
}

/// Run the projection pipeline on `panel`.
///
/// The panel is decomposed into `config.components` components. In
/// `Bilinear` mode only the leading one is forecast and reconstructed; in
/// `Multilinear` mode all of them are. When simulation is configured, bands
/// are computed for every forecast period, either per component on the time
/// factors or per category on the forecast rates.
///
/// # Example
/// ```
/// use anofox_demography::core::RatePanel;
/// use anofox_demography::projection::{project, ProjectionConfig};
///
/// let rows: Vec<Vec<f64>> = (0..12)
///     .map(|t| {
///         let k = -0.05 * t as f64;
///         vec![(-6.0 + 0.5 * k).exp(), (-4.0 + 0.8 * k).exp(), (-2.0 + 1.0 * k).exp()]
///     })
///     .collect();
/// let categories = vec!["0-14".to_string(), "15-64".to_string(), "65+".to_string()];
/// let panel = RatePanel::new((2000..2012).collect(), categories, rows).unwrap();
///
/// let projection = project(&panel, &ProjectionConfig::new(5)).unwrap();
/// assert_eq!(projection.forecast_rates().periods(), &[2012, 2013, 2014, 2015, 2016]);
/// ```
pub fn project(panel: &RatePanel, config: &ProjectionConfig) -> Result<Projection> {
    config.validate()?;
    let simulator = config
        .simulation
        .clone()
        .map(UncertaintySimulator::new)
        .transpose()?;

    let decomposer = FactorDecomposer::new();
    let decomposition = decomposer.decompose(panel, config.components)?;
    let used = match config.mode {
        ReconstructionMode::Bilinear => decomposition.leading(1)?,
        ReconstructionMode::Multilinear => decomposition.clone(),
    };

    let history = used.time_factors();
    let time_factors =
        SeriesForecaster::new(config.forecast).forecast_components(&history, config.horizon)?;

    let fitted_rates = decomposer.reconstruct(&used, &history)?;
    let forecast_rates = decomposer.reconstruct(&used, &time_factors.future()?)?;

    let bands = match simulator {
        Some(simulator) => {
            let series: Vec<(String, Vec<f64>)> = match simulator.config().target {
                UncertaintyTarget::TimeFactor => (0..time_factors.n_components())
                    .map(|c| (format!("component {}", c), time_factors.forecast(c).to_vec()))
                    .collect(),
                UncertaintyTarget::Rate => forecast_rates
                    .categories()
                    .iter()
                    .enumerate()
                    .map(|(x, name)| (name.clone(), forecast_rates.column(x)))
                    .collect(),
            };
            simulator.simulate_bands(time_factors.future_periods(), &series)?
        }
        None => Vec::new(),
    };

    debug!(
        "projected {} categories over {} future periods using {} component(s), {} band(s)",
        panel.n_categories(),
        config.horizon,
        used.n_components(),
        bands.len()
    );

    Ok(Projection {
        decomposition,
        time_factors,
        fitted_rates,
        forecast_rates,
        bands,
    })
}
