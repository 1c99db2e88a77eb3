#[derive(thiserror::Error, Debug)]
pub enum JsError {
    /// An exception propagated out of the script without being caught by a
    /// `try`/`catch`. Carries the formatted thrown value.
    #[error("uncaught exception: {0}")]
    Uncaught(String),

    /// The embedder asked for a module the registered loader cannot provide.
    #[error("module not found: {0}")]
    ModuleNotFound(String),
}
