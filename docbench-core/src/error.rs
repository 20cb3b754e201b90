use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EvalError {
    #[snafu(display("Config error for task `{}`: {}", task, message))]
    Config { task: String, message: String },
    #[snafu(display("No config for task {}", task))]
    MissingTaskConfig { task: String },
    #[snafu(display("Schema error in `{}`: {}", path, message))]
    Schema { path: String, message: String },
    #[snafu(display("Geometry error: poly must have 8 values, got {}", len))]
    Geometry { len: usize },
    #[snafu(display("Unknown {} `{}`", kind, name))]
    UnknownComponent { kind: String, name: String },
    #[snafu(display("{} `{}` is already registered", kind, name))]
    DuplicateRegistration { kind: String, name: String },
    #[snafu(display("No prediction found for sample `{}`", key))]
    MatchingWarning { key: String },
    #[snafu(display("Metric `{}` failed on category `{}`: {}", metric, category, message))]
    Metric {
        metric: String,
        category: String,
        message: String,
    },
    #[snafu(display("Read `{}` error: {}", path, source))]
    IoRead {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Write `{}` error: {}", path, source))]
    IoWrite {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Json `{}` error: {}", path, source))]
    Json {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Toml `{}` error: {}", path, source))]
    Toml {
        source: toml::de::Error,
        path: String,
    },
}
