pub mod accuracy;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod feedback;
pub mod guide;
pub mod http_client;
pub mod model;
pub mod registry;
pub mod report;
pub mod scoring;
pub mod sink;

pub use accuracy::{AccuracyProfile, Band, confidence_bands};
pub use error::{Axis, EngineError};
pub use feedback::{ActualPolicy, FeedbackRecord, PlayerInfo, PredictionSession, build_record};
pub use model::CoefficientModel;
pub use registry::{ModelRegistry, ModelVersion};
pub use scoring::{PredictionAttributes, score};
pub use sink::{FeedbackSink, submit};
