pub mod app;

pub use app::{
    AppConfig, HttpConfig, ScheduleConfig, SourceConfig, StoreConfig, WorkerConfig,
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};
