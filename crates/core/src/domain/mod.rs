pub mod legacy;
pub mod prices;
pub mod record;

pub use prices::{DataStatus, PriceSource, CORE_SYMBOLS};
pub use record::{
    ComponentNotes, ComponentScores, ConfidenceLevel, Light, MarketRegime, Momentum,
    RiskIndexRecord, RiskLevel, ThemeScore,
};
