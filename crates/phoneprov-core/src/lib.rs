//! Phoneprov Core - Domain logic for configuration resolution and provisioning.
//!
//! This crate contains the pure pieces of the engine: template rendering,
//! formatting normalization, MAC canonicalization, variable tier merging,
//! template variable validation, and the domain types shared between the
//! store and the HTTP surface.

pub mod bulk;
pub mod context;
pub mod device;
pub mod error;
pub mod mac;
pub mod normalize;
pub mod provision;
pub mod template;
pub mod template_vars;
pub mod token;
pub mod vars;
pub mod version;

pub use bulk::{BulkOperation, BulkOperationDetail, ExecuteReport, MutatedDevice, PreviewHit, PreviewReport};
pub use context::{OperatorContext, Permission};
pub use device::{Device, DeviceType, Pabx};
pub use error::{Error, Result};
pub use mac::MacAddr;
pub use normalize::normalize;
pub use provision::{ProvisionAttempt, ProvisionStatus};
pub use template::{Template, render};
pub use template_vars::{TemplateVariable, VarType};
pub use token::{DownloadToken, RedeemDenied};
pub use vars::{GlobalVariable, TierSet, VarMap};
pub use version::{ConfigVersion, DeviceAssignment, HistoryEntry, VersionScope};
