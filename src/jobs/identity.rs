use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag value marking an identity as belonging to a job
pub const TAG_JOB: &str = "job";
/// Tag value marking an identity as belonging to a worker
pub const TAG_WORKER: &str = "worker";

/// Immutable descriptor for a job or worker, used as the lookup key for every
/// status, channel, and scheduled timer in the engine.
///
/// # Examples
///
/// ```rust
/// use foreman_core::jobs::identity::Identity;
///
/// let id = Identity::job("supportcentral", "email", "poller", "0", "dev");
/// assert_eq!(id.to_string(), "supportcentral.email.poller-0");
/// assert!(id.is_job());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub area: String,
    pub service: String,
    pub name: String,
    pub instance: String,
    pub tags: Vec<String>,
    pub env: String,
}

impl Identity {
    pub fn new(
        area: impl Into<String>,
        service: impl Into<String>,
        name: impl Into<String>,
        instance: impl Into<String>,
        tags: Vec<String>,
        env: impl Into<String>,
    ) -> Self {
        Self {
            area: area.into(),
            service: service.into(),
            name: name.into(),
            instance: instance.into(),
            tags,
            env: env.into(),
        }
    }

    /// Create an identity tagged as a job
    pub fn job(
        area: impl Into<String>,
        service: impl Into<String>,
        name: impl Into<String>,
        instance: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self::new(area, service, name, instance, vec![TAG_JOB.to_string()], env)
    }

    /// Create an identity tagged as a worker
    pub fn worker(
        area: impl Into<String>,
        service: impl Into<String>,
        name: impl Into<String>,
        instance: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self::new(
            area,
            service,
            name,
            instance,
            vec![TAG_WORKER.to_string()],
            env,
        )
    }

    pub fn is_job(&self) -> bool {
        self.tags.iter().any(|t| t == TAG_JOB)
    }

    pub fn is_worker(&self) -> bool {
        self.tags.iter().any(|t| t == TAG_WORKER)
    }

    /// Fully qualified name without the instance discriminator
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.area, self.service, self.name)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.area, self.service, self.name, self.instance
        )
    }
}
