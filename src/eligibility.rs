//! Per-resource decision on whether a stylesheet may join a combined request.

use url::Url;

use crate::hooks::ConcatHooks;
use crate::models::{ResolvedPath, StyleResource, TextDirection};
use crate::resolver::PathResolver;

const STYLESHEET_MARKER: &str = ".css";

/// Why a resource is served on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
  /// The source path carries no stylesheet extension.
  NotStylesheet,
  /// The stylesheet is only loaded under a browser condition.
  Conditional,
  /// The page is right-to-left and the registration has an RTL variant.
  RtlVariant,
  /// The source is hosted on another origin.
  External,
  /// The source does not map onto a file inside the trusted root.
  Unresolvable,
  /// A host hook excluded the handle.
  Overridden,
}

/// Outcome of evaluating one registration.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
  /// May be concatenated; carries the canonical location used for addressing.
  Eligible(ResolvedPath),
  /// Must be served individually.
  Ineligible(IneligibleReason),
}

impl Eligibility {
  /// Boolean view of the decision.
  pub fn is_eligible(&self) -> bool {
    matches!(self, Self::Eligible(_))
  }
}

/// Evaluate `resource` against every veto and the host override.
///
/// Vetoes are policy, not errors: unresolvable and missing files simply end up ineligible.
/// The host override sees every decision except the RTL veto, which always holds.
pub fn evaluate<R, H>(
  resource: &StyleResource,
  site: &Url,
  direction: TextDirection,
  resolver: &R,
  hooks: &H,
) -> Eligibility
where
  R: PathResolver + ?Sized,
  H: ConcatHooks + ?Sized,
{
  let resolved = resolver.resolve(&resource.src, site);
  let servable = resolved
    .as_ref()
    .is_none_or(|path| is_servable_stylesheet(&path.root_relative));
  let resolved = resolved.filter(|_| servable);
  let veto = first_veto(resource, site, direction, resolver, servable, resolved.is_some());

  if veto == Some(IneligibleReason::RtlVariant) {
    return Eligibility::Ineligible(IneligibleReason::RtlVariant);
  }

  let allowed = hooks.allow_concat(&resource.handle, veto.is_none());
  match (allowed, resolved, veto) {
    (false, _, Some(reason)) => Eligibility::Ineligible(reason),
    (false, _, None) => Eligibility::Ineligible(IneligibleReason::Overridden),
    (true, Some(path), _) => Eligibility::Eligible(path),
    (true, None, _) => {
      tracing::warn!(
        handle = %resource.handle,
        src = %resource.src,
        "concatenation forced for a stylesheet the endpoint cannot serve; serving it separately"
      );
      Eligibility::Ineligible(IneligibleReason::Unresolvable)
    }
  }
}

/// Boolean form of [`evaluate`].
pub fn is_eligible<R, H>(
  resource: &StyleResource,
  site: &Url,
  direction: TextDirection,
  resolver: &R,
  hooks: &H,
) -> bool
where
  R: PathResolver + ?Sized,
  H: ConcatHooks + ?Sized,
{
  evaluate(resource, site, direction, resolver, hooks).is_eligible()
}

fn first_veto<R: PathResolver + ?Sized>(
  resource: &StyleResource,
  site: &Url,
  direction: TextDirection,
  resolver: &R,
  servable: bool,
  resolved: bool,
) -> Option<IneligibleReason> {
  if !has_stylesheet_marker(&resource.src) || !servable {
    return Some(IneligibleReason::NotStylesheet);
  }
  if resource.is_conditional() {
    return Some(IneligibleReason::Conditional);
  }
  if direction == TextDirection::Rtl && resource.has_rtl_variant() {
    return Some(IneligibleReason::RtlVariant);
  }
  if !resolver.is_internal(&resource.src, site) {
    return Some(IneligibleReason::External);
  }
  if !resolved {
    return Some(IneligibleReason::Unresolvable);
  }
  None
}

/// The marker is searched in the path only, so `?format=.css` does not count.
fn has_stylesheet_marker(src: &str) -> bool {
  let path = src.split(['?', '#']).next().unwrap_or_default();
  path.contains(STYLESHEET_MARKER)
}

/// Whether the delivery endpoint will serve `root_relative`.
///
/// Sources such as `/custom.css.php` carry the marker without being stylesheet files.
pub(crate) fn is_servable_stylesheet(root_relative: &str) -> bool {
  root_relative.ends_with(STYLESHEET_MARKER)
}
