use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};


/// Caller bookkeeping attached to a job. The pool never reads it.
pub type Metadata = HashMap<String, serde_json::Value>;


#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(pub String);

impl JobType {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobType {
    fn from(job_type: &str) -> Self {
        Self(job_type.to_owned())
    }
}

impl From<String> for JobType {
    fn from(job_type: String) -> Self {
        Self(job_type)
    }
}


/// Identity of a job, independent of its payload and outcome.
///
/// `Default` is the zero descriptor that cancellation results carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub job_type: JobType,
    #[serde(default)]
    pub metadata: Metadata,
}

impl JobDescriptor {
    pub fn new(id: impl Into<JobId>, job_type: impl Into<JobType>) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True only for the zero descriptor.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id.0.is_empty() && self.job_type.0.is_empty() && self.metadata.is_empty()
    }
}
