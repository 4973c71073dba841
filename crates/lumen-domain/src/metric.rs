//! Metric module - the indicators tracked per (entity, year)

/// A tracked metric
///
/// The dashboard compares exactly two indicators. Each carries its upstream
/// indicator code and a fixed display range for its chart axis:
/// - ElectricityAccess: percentage of population, scaled 0-100
/// - InfantMortality: deaths per 1,000 live births, scaled 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// Access to electricity (% of population)
    ElectricityAccess,

    /// Mortality rate, infant (per 1,000 live births)
    InfantMortality,
}

impl Metric {
    /// All tracked metrics, in series order
    pub const ALL: [Metric; 2] = [Metric::ElectricityAccess, Metric::InfantMortality];

    /// Upstream indicator code
    pub fn indicator(&self) -> &'static str {
        match self {
            Metric::ElectricityAccess => "EG.ELC.ACCS.ZS",
            Metric::InfantMortality => "SP.DYN.IMRT.IN",
        }
    }

    /// Short series label used on the chart legend and axis
    pub fn label(&self) -> &'static str {
        match self {
            Metric::ElectricityAccess => "Electricity Access (%)",
            Metric::InfantMortality => "Infant Mortality (per 1,000)",
        }
    }

    /// Series color
    pub fn color(&self) -> &'static str {
        match self {
            Metric::ElectricityAccess => "blue",
            Metric::InfantMortality => "red",
        }
    }

    /// Fixed vertical display range `(low, high)`
    ///
    /// This is a presentation contract, not a bound computed from data.
    pub fn display_range(&self) -> (f64, f64) {
        match self {
            Metric::ElectricityAccess => (0.0, 100.0),
            Metric::InfantMortality => (0.0, 100.0),
        }
    }
}
