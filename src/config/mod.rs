pub mod schema;

pub use schema::{
    Config, HooksConfig, ImproveConfig, MetricsConfig, RecorderConfig, StoreConfig,
    ValidatorConfig,
};
