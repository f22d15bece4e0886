use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("{series} series is not in ascending order at index {index}: {details}")]
    UnorderedSeries {
        series: String,
        index: usize,
        details: String,
    },

    #[error("Consumption intervals overlap at index {index}: interval starts at {start} before previous interval ends at {previous_end}")]
    OverlappingIntervals {
        index: usize,
        start: String,
        previous_end: String,
    },

    #[error("Invalid interval at index {index}: {details}")]
    InvalidInterval { index: usize, details: String },

    #[error("Negative consumption {value} at index {index}")]
    NegativeConsumption { index: usize, value: f64 },

    #[error("Invalid gas conversion factor {0}: must be a positive finite number")]
    InvalidConversionFactor(f64),

    #[error("Invalid GSP region '{0}': expected one of A-H, J-N or P")]
    InvalidRegion(String),

    #[error("Invalid price cap row: {0}")]
    InvalidPriceCap(String),

    #[error("Invalid price adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
