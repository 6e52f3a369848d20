mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    ConsumerSettings, DatabaseSettings, EventBusProviderSetting, EventBusSettings,
    LoggingSettings, ServerSettings, Settings, StorageProviderSetting, StorageSettings,
    WorkerSettings,
};
