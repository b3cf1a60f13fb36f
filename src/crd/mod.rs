//! Custom Resource Definitions for analytics workspaces
//!
//! Both kinds are provisioned outside this crate. They are defined here so
//! the client can deserialize them and the CLI can print their CRDs.

mod binding;
mod workspace;

pub use binding::{
    AnalyticsWorkspaceBinding, AnalyticsWorkspaceBindingSpec, AnalyticsWorkspaceBindingStatus,
};
pub use workspace::{AnalyticsWorkspace, AnalyticsWorkspaceSpec};

/// Label carrying the label-token form of a binding's username
pub const USERNAME_LABEL: &str = "xlscsde.nhs.uk/username";

/// Schema for free-form spec fields the API server must keep as-is
pub(crate) fn preserve_unknown_fields(
    _gen: &mut schemars::gen::SchemaGenerator,
) -> schemars::schema::Schema {
    let mut obj = schemars::schema::SchemaObject {
        instance_type: Some(schemars::schema::InstanceType::Object.into()),
        ..Default::default()
    };
    obj.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    schemars::schema::Schema::Object(obj)
}
