//! Request-scoped planner partitioning a stylesheet queue into delivery groups.

use std::collections::{HashMap, VecDeque};

use anyhow::{Context, Result};
use url::Url;

use crate::config::ConcatConfig;
use crate::eligibility::{Eligibility, evaluate};
use crate::hooks::{ConcatHooks, DefaultHooks};
use crate::markup::{ItemRenderer, MarkupEmitter, Rendered};
use crate::models::{DoneSet, Group, GroupKind, GroupMember, StyleResource, TextDirection};
use crate::resolver::{PathResolver, SiteResolver, site_base};

/// Plans one page render's stylesheet output.
///
/// Build one planner per request; it holds no state between passes.
#[derive(Debug, Clone)]
pub struct ConcatPlanner<R = SiteResolver, H = DefaultHooks> {
  site: Url,
  direction: TextDirection,
  endpoint_url: String,
  allow_gzip_compression: bool,
  resolver: R,
  hooks: H,
}

impl ConcatPlanner<SiteResolver, DefaultHooks> {
  /// Planner backed by the filesystem resolver described by `config`.
  pub fn from_config(config: &ConcatConfig, direction: TextDirection) -> Result<Self> {
    let site = config.site_base_url()?;
    let resolver = SiteResolver::new(&config.trusted_root).with_context(|| {
      format!(
        "failed to resolve trusted root {}",
        config.trusted_root.display()
      )
    })?;

    Ok(
      Self::new(site, resolver, DefaultHooks)
        .with_direction(direction)
        .with_endpoint(&config.endpoint_url, config.allow_gzip_compression),
    )
  }
}

impl<R: PathResolver, H: ConcatHooks> ConcatPlanner<R, H> {
  /// Planner for `site`; the site URL passes through [`ConcatHooks::site_url`] once here
  /// and is then normalised to end with `/`.
  pub fn new(site: Url, resolver: R, hooks: H) -> Self {
    let site = site_base(&hooks.site_url(&site));
    let defaults = ConcatConfig::default();
    Self {
      site,
      direction: TextDirection::default(),
      endpoint_url: defaults.endpoint_url,
      allow_gzip_compression: defaults.allow_gzip_compression,
      resolver,
      hooks,
    }
  }

  /// Replace the hooks, re-applying the site URL override.
  pub fn with_hooks<H2: ConcatHooks>(self, hooks: H2) -> ConcatPlanner<R, H2> {
    let site = site_base(&hooks.site_url(&self.site));
    ConcatPlanner {
      site,
      direction: self.direction,
      endpoint_url: self.endpoint_url,
      allow_gzip_compression: self.allow_gzip_compression,
      resolver: self.resolver,
      hooks,
    }
  }

  /// Text direction of the page being rendered.
  pub fn with_direction(mut self, direction: TextDirection) -> Self {
    self.direction = direction;
    self
  }

  /// Delivery endpoint combined links point at.
  pub fn with_endpoint(mut self, endpoint_url: &str, allow_gzip_compression: bool) -> Self {
    self.endpoint_url = endpoint_url.to_string();
    self.allow_gzip_compression = allow_gzip_compression;
    self
  }

  /// Effective site base URL.
  pub fn site(&self) -> &Url {
    &self.site
  }

  /// Hooks consulted by this planner.
  pub fn hooks(&self) -> &H {
    &self.hooks
  }

  /// Drain `queue` and partition it into ordered groups.
  ///
  /// Handles already in `done` are dropped without evaluation. Eligible resources are
  /// merged into the open combined group when it shares their media; anything else closes
  /// it, and a closed group is never reopened even when the same media recurs.
  pub fn plan(&self, queue: &mut VecDeque<StyleResource>, done: &DoneSet) -> Vec<Group> {
    let pending = drain_pending(queue, done);
    let mut groups: Vec<Group> = Vec::new();

    for mut resource in pending {
      resource.src = self.hooks.source(&resource.handle, &resource.src);
      let media = resource.media().to_string();

      match evaluate(
        &resource,
        &self.site,
        self.direction,
        &self.resolver,
        &self.hooks,
      ) {
        Eligibility::Eligible(path) => {
          let member = GroupMember {
            resource,
            path: Some(path),
          };
          let open = groups
            .last_mut()
            .filter(|open| open.kind == GroupKind::Combined && open.media == media);
          match open {
            Some(open) => open.members.push(member),
            None => push_group(&mut groups, media, GroupKind::Combined, member),
          }
        }
        Eligibility::Ineligible(reason) => {
          tracing::debug!(
            handle = %resource.handle,
            ?reason,
            "stylesheet served separately"
          );
          let member = GroupMember {
            resource,
            path: None,
          };
          push_group(&mut groups, media, GroupKind::Singleton, member);
        }
      }
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
      let summaries: Vec<_> = groups.iter().map(Group::summary).collect();
      tracing::debug!(
        plan = %serde_json::to_string(&summaries).unwrap_or_default(),
        "planned stylesheet groups"
      );
    }
    groups
  }

  /// Plan, render and record a whole pass.
  ///
  /// Every emitted handle is added to `done`, so calling this again with leftovers of the
  /// same request never emits a handle twice.
  pub fn do_items<I: ItemRenderer>(
    &self,
    queue: &mut VecDeque<StyleResource>,
    done: &mut DoneSet,
    items: I,
  ) -> Rendered {
    let groups = self.plan(queue, done);
    let emitter = MarkupEmitter::new(
      &self.endpoint_url,
      self.allow_gzip_compression,
      &self.hooks,
      items,
    );
    let rendered = emitter.render(&groups);
    done.extend(&rendered.done);
    rendered
  }
}

fn push_group(groups: &mut Vec<Group>, media: String, kind: GroupKind, member: GroupMember) {
  groups.push(Group {
    index: groups.len(),
    media,
    kind,
    members: vec![member],
  });
}

/// Empty the queue, skipping finished handles and collapsing duplicates.
///
/// A repeated handle keeps the position of its first registration and the data of its last.
fn drain_pending(queue: &mut VecDeque<StyleResource>, done: &DoneSet) -> Vec<StyleResource> {
  let mut pending: Vec<StyleResource> = Vec::with_capacity(queue.len());
  let mut positions: HashMap<String, usize> = HashMap::new();

  while let Some(resource) = queue.pop_front() {
    if done.contains(&resource.handle) {
      tracing::debug!(handle = %resource.handle, "skipping stylesheet already printed");
      continue;
    }

    match positions.get(&resource.handle) {
      Some(&position) => {
        tracing::warn!(
          handle = %resource.handle,
          "duplicate stylesheet handle in queue; last registration wins"
        );
        pending[position] = resource;
      }
      None => {
        positions.insert(resource.handle.clone(), pending.len());
        pending.push(resource);
      }
    }
  }

  pending
}
