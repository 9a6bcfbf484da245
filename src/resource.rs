//! Resource taxonomy used to tag tables for diagnostics.

use std::fmt;

/// Kind of directory resource stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Application,
    ApplicationTemplate,
    Bundle,
    BundleInstanceAuth,
    Api,
    EventDefinition,
    Document,
    FetchRequest,
    Label,
    LabelDefinition,
    Runtime,
    RuntimeContext,
    Tenant,
    Webhook,
    Formation,
    FormationAssignment,
    SystemAuth,
    Certificate,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Application => "application",
            ResourceType::ApplicationTemplate => "applicationTemplate",
            ResourceType::Bundle => "bundle",
            ResourceType::BundleInstanceAuth => "bundleInstanceAuth",
            ResourceType::Api => "api",
            ResourceType::EventDefinition => "eventDefinition",
            ResourceType::Document => "document",
            ResourceType::FetchRequest => "fetchRequest",
            ResourceType::Label => "label",
            ResourceType::LabelDefinition => "labelDefinition",
            ResourceType::Runtime => "runtime",
            ResourceType::RuntimeContext => "runtimeContext",
            ResourceType::Tenant => "tenant",
            ResourceType::Webhook => "webhook",
            ResourceType::Formation => "formation",
            ResourceType::FormationAssignment => "formationAssignment",
            ResourceType::SystemAuth => "systemAuth",
            ResourceType::Certificate => "certificate",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
