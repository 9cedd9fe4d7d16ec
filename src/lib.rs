//! formsync - bidirectional binding between configuration trees and UI controls

pub mod binder;
pub mod capability;
pub mod config;
pub mod control;
pub mod error;
pub mod headless;
pub mod persist;
pub mod registry;
pub mod resolver;
pub mod similarity;
pub mod value;

pub use binder::{shared, Binder, BinderBuilder, Hook, SharedTree};
pub use capability::{capability_for, Capability, DATE_FORMAT};
pub use config::{BindingConfig, ControlManifest, ControlSpec, ResolverConfig};
pub use control::{
    list_controls, ChangeCallback, ControlContainer, ControlHandle, ControlKind, Number,
    SubscriptionId,
};
pub use error::{FixSuggestion, FormSyncError, Result};
pub use headless::HeadlessControl;
pub use registry::BindingRegistry;
pub use resolver::{KeyResolver, KeySource, ResolutionMap, UnmatchedPolicy};
pub use value::{ConfigTree, Node, Scalar};
