//! Feature group variants and what each of them supports.

use metastore_core::records::FeatureGroupType;
use std::fmt::{Display, Formatter};

/// The closed set of feature group variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGroupKind {
    /// Data written and stored by the feature store.
    Managed,
    /// Data living in an external system, registered on demand.
    External,
    /// Data ingested continuously through an online topic.
    Streaming,
}

/// Operations a variant supports beyond the shared lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// May be bound to an online topic and schema registry subject.
    pub online: bool,
    /// Always online, regardless of the `online_enabled` flag.
    pub always_online: bool,
    /// Creation requires a source to read from.
    pub requires_source: bool,
    /// Carries write options for the ingestion job.
    pub write_options: bool,
}

impl FeatureGroupKind {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            FeatureGroupKind::Managed => Capabilities {
                online: true,
                always_online: false,
                requires_source: false,
                write_options: false,
            },
            FeatureGroupKind::External => Capabilities {
                online: false,
                always_online: false,
                requires_source: true,
                write_options: false,
            },
            FeatureGroupKind::Streaming => Capabilities {
                online: true,
                always_online: true,
                requires_source: false,
                write_options: true,
            },
        }
    }

    /// Alias of the temporary view registered for schema inference.
    pub fn temporary_view_alias(&self) -> &'static str {
        match self {
            FeatureGroupKind::External => "read_ondmd",
            FeatureGroupKind::Managed | FeatureGroupKind::Streaming => "read_source",
        }
    }

    pub fn record_type(&self) -> FeatureGroupType {
        match self {
            FeatureGroupKind::Managed => FeatureGroupType::Managed,
            FeatureGroupKind::External => FeatureGroupType::External,
            FeatureGroupKind::Streaming => FeatureGroupType::Stream,
        }
    }
}

impl From<FeatureGroupType> for FeatureGroupKind {
    fn from(group_type: FeatureGroupType) -> Self {
        match group_type {
            FeatureGroupType::Managed => FeatureGroupKind::Managed,
            FeatureGroupType::External => FeatureGroupKind::External,
            FeatureGroupType::Stream => FeatureGroupKind::Streaming,
        }
    }
}

impl Display for FeatureGroupKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureGroupKind::Managed => write!(f, "managed"),
            FeatureGroupKind::External => write!(f, "external"),
            FeatureGroupKind::Streaming => write!(f, "streaming"),
        }
    }
}
