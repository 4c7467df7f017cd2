//! Data structures read and produced during a planning pass.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Media value used when a registration does not declare one.
pub const DEFAULT_MEDIA: &str = "all";

/// A stylesheet registration handed over by the upstream registry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleResource {
  /// Unique key of the registration.
  pub handle: String,
  /// Declared source URL, absolute or relative to the site.
  pub src: String,
  /// Media query the stylesheet applies to.
  #[serde(default)]
  pub media: Option<String>,
  /// Browser condition expression for conditionally loaded stylesheets.
  #[serde(default)]
  pub conditional: Option<String>,
  /// Whether the registration carries a right-to-left variant.
  #[serde(default)]
  pub rtl: bool,
  /// Inline CSS blocks printed right after the stylesheet.
  #[serde(default)]
  pub inline_after: Vec<String>,
  /// Registry-specific metadata the planner passes through untouched.
  #[serde(default)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl StyleResource {
  /// Plain registration for `src` with every optional field left empty.
  pub fn new(handle: impl Into<String>, src: impl Into<String>) -> Self {
    Self {
      handle: handle.into(),
      src: src.into(),
      media: None,
      conditional: None,
      rtl: false,
      inline_after: Vec::new(),
      extra: BTreeMap::new(),
    }
  }

  /// Builder-style media override.
  pub fn with_media(mut self, media: impl Into<String>) -> Self {
    self.media = Some(media.into());
    self
  }

  /// Builder-style browser condition.
  pub fn with_conditional(mut self, condition: impl Into<String>) -> Self {
    self.conditional = Some(condition.into());
    self
  }

  /// Builder-style RTL variant flag.
  pub fn with_rtl(mut self) -> Self {
    self.rtl = true;
    self
  }

  /// Builder-style inline CSS attachment.
  pub fn with_inline(mut self, css: impl Into<String>) -> Self {
    self.inline_after.push(css.into());
    self
  }

  /// Effective media value, falling back to `all` for missing or blank declarations.
  pub fn media(&self) -> &str {
    match self.media.as_deref().map(str::trim) {
      Some(media) if !media.is_empty() => media,
      _ => DEFAULT_MEDIA,
    }
  }

  /// Browser condition, from the dedicated field or a registry's `conditional` extra.
  pub fn condition(&self) -> Option<&str> {
    self
      .conditional
      .as_deref()
      .or_else(|| self.extra.get("conditional").and_then(serde_json::Value::as_str))
  }

  /// Whether the stylesheet is only rendered under a browser condition.
  pub fn is_conditional(&self) -> bool {
    self.conditional.is_some() || self.extra.contains_key("conditional")
  }

  /// Whether the registration carries an RTL variant, from the flag or a truthy `rtl` extra.
  pub fn has_rtl_variant(&self) -> bool {
    self.rtl
      || self.extra.get("rtl").is_some_and(|value| match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => !text.is_empty() && text != "0",
        serde_json::Value::Number(number) => number.as_f64() != Some(0.0),
        _ => true,
      })
  }
}

/// Document text direction for the current page render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
  /// Left to right.
  #[default]
  Ltr,
  /// Right to left.
  Rtl,
}

/// Canonical location of a stylesheet inside the trusted root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
  /// Canonical absolute path on disk.
  pub canonical: PathBuf,
  /// Path relative to the trusted root, always starting with `/`.
  pub root_relative: String,
}

/// How a group is delivered to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
  /// Served through the concatenation endpoint.
  Combined,
  /// Served from its original source.
  Singleton,
}

/// One resource placed into a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
  /// Registration this member came from, with its effective source applied.
  pub resource: StyleResource,
  /// Resolved location; present for every member of a combined group.
  pub path: Option<ResolvedPath>,
}

impl GroupMember {
  /// Handle of the underlying registration.
  pub fn handle(&self) -> &str {
    &self.resource.handle
  }
}

/// Ordered output unit of the grouping engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
  /// Insertion order of the group within the pass.
  pub index: usize,
  /// Media value shared by every member.
  pub media: String,
  /// Delivery kind.
  pub kind: GroupKind,
  /// Members in original queue order. Never empty.
  pub members: Vec<GroupMember>,
}

impl Group {
  /// Handles of every member, in order.
  pub fn handles(&self) -> Vec<&str> {
    self.members.iter().map(GroupMember::handle).collect()
  }

  /// Serializable summary used for logging and host-side inspection.
  pub fn summary(&self) -> GroupSummary {
    GroupSummary {
      index: self.index,
      media: self.media.clone(),
      kind: self.kind,
      handles: self.handles().into_iter().map(str::to_string).collect(),
    }
  }
}

/// Serializable view of a [`Group`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
  /// Insertion order of the group.
  pub index: usize,
  /// Shared media value.
  pub media: String,
  /// Delivery kind.
  pub kind: GroupKind,
  /// Member handles in order.
  pub handles: Vec<String>,
}

/// Cache-friendly address of a combined group's payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupIdentifier {
  /// Root-relative paths joined, base64 encoded and URL escaped.
  pub encoded_path_list: String,
  /// Latest modification time across the members, in seconds since the Unix epoch.
  pub freshness: i64,
}

/// Handles already emitted during the current request, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoneSet {
  order: Vec<String>,
  seen: BTreeSet<String>,
}

impl DoneSet {
  /// Empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `handle`. Returns `false` when it was already present.
  pub fn insert(&mut self, handle: &str) -> bool {
    if !self.seen.insert(handle.to_string()) {
      return false;
    }
    self.order.push(handle.to_string());
    true
  }

  /// Whether `handle` was already emitted.
  pub fn contains(&self, handle: &str) -> bool {
    self.seen.contains(handle)
  }

  /// Number of recorded handles.
  pub fn len(&self) -> usize {
    self.order.len()
  }

  /// Whether no handle has been recorded.
  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Handles in emission order.
  pub fn as_slice(&self) -> &[String] {
    &self.order
  }

  /// Merge another set, preserving this set's order first.
  pub fn extend(&mut self, other: &DoneSet) {
    for handle in &other.order {
      self.insert(handle);
    }
  }
}
