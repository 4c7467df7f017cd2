#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod delivery;
pub mod eligibility;
pub mod error;
pub mod hooks;
pub mod identifier;
pub mod markup;
pub mod models;
pub mod planner;
pub mod resolver;

pub use config::ConcatConfig;
pub use delivery::{ConcatDelivery, DeliveryRequest, DeliveryResponse};
pub use eligibility::{Eligibility, IneligibleReason};
pub use error::{DeliveryError, PlanError};
pub use hooks::{ConcatHooks, DefaultHooks};
pub use markup::{ItemRenderer, MarkupEmitter, Rendered, StandardItemRenderer};
pub use models::{
  DoneSet, Group, GroupIdentifier, GroupKind, GroupMember, StyleResource, TextDirection,
};
pub use planner::ConcatPlanner;
pub use resolver::{PathResolver, SiteResolver};
