//! Caching worker registration.
//!
//! At boot the application asks a [`WorkerRegistrar`] to install its
//! offline-caching worker. Failure is reported back to the core and never
//! stops the application.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Result of a successful registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Script that was registered
    pub script: String,
    /// Scope controlled by the worker
    pub scope: String,
}

/// Registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The script is not a same-origin absolute path
    #[error("worker script '{0}' is not a same-origin path")]
    CrossOrigin(String),

    /// The registrar refused the script for another reason
    #[error("worker registration failed: {0}")]
    Failed(String),
}

/// Installs the caching worker
pub trait WorkerRegistrar: Send + Sync {
    /// Register the worker served at `script`
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] if the worker cannot be registered.
    fn register(
        &self,
        script: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Registration, RegistrationError>> + Send + '_>>;
}

/// Registrar for a worker served by the application itself
///
/// The scope is the directory the script lives in.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalRegistrar;

impl LocalRegistrar {
    /// Creates a new local registrar
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Scope of a same-origin script path
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::CrossOrigin`] unless `script` starts with
    /// a single `/`.
    pub fn scope_of(script: &str) -> Result<String, RegistrationError> {
        if !script.starts_with('/') || script.starts_with("//") {
            return Err(RegistrationError::CrossOrigin(script.to_string()));
        }
        let directory_end = script.rfind('/').map_or(1, |index| index + 1);
        Ok(script[..directory_end].to_string())
    }
}

impl WorkerRegistrar for LocalRegistrar {
    fn register(
        &self,
        script: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Registration, RegistrationError>> + Send + '_>> {
        let script = script.to_string();
        Box::pin(async move {
            let scope = Self::scope_of(&script)?;
            tracing::info!(%script, %scope, "Caching worker registered");
            Ok(Registration { script, scope })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_script_directory() {
        assert_eq!(LocalRegistrar::scope_of("/service-worker.js").unwrap(), "/");
        assert_eq!(
            LocalRegistrar::scope_of("/static/js/sw.js").unwrap(),
            "/static/js/"
        );
        assert_eq!(LocalRegistrar::scope_of("/app/").unwrap(), "/app/");
    }

    #[test]
    fn rejects_cross_origin_scripts() {
        for script in ["service-worker.js", "//cdn.example.com/sw.js", "https://x/sw.js", ""] {
            assert_eq!(
                LocalRegistrar::scope_of(script),
                Err(RegistrationError::CrossOrigin(script.to_string()))
            );
        }
    }

    #[tokio::test]
    async fn register_reports_scope() {
        let registration = LocalRegistrar::new()
            .register("/service-worker.js")
            .await
            .unwrap();
        assert_eq!(
            registration,
            Registration {
                script: "/service-worker.js".to_string(),
                scope: "/".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn register_fails_cross_origin() {
        let error = LocalRegistrar::new()
            .register("//evil.example/sw.js")
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "worker script '//evil.example/sw.js' is not a same-origin path"
        );
    }
}
