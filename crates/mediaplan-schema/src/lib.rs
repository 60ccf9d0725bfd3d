//! # mediaplan-schema
//!
//! Schema-level services for media plan documents:
//!
//! - [`registry`]: which schema versions exist and what each one requires
//! - [`validator`]: structural and business-rule checks against a version
//! - [`compatibility`]: how a plan's version relates to the current one
//! - [`migration`]: version-to-version document transformation with
//!   provenance tracking
//!
//! Services receive their registry explicitly (`Arc<dyn SchemaRegistry>`);
//! there is no process-wide default instance.

pub mod compatibility;
pub mod error;
pub mod migration;
pub mod registry;
pub mod validator;

pub use compatibility::{classify, recommendation, Compatibility, Recommendation, RecommendedAction};
pub use error::{SchemaError, SchemaResult};
pub use migration::{
    MigrationCompatibility, MigrationStep, MigrationType, SchemaMigrator, V2ToV3,
};
pub use registry::{BundledSchemaRegistry, SchemaDocument, SchemaKind, SchemaRegistry};
pub use validator::{DocumentValidator, SchemaValidator, Severity, ValidationIssue};
