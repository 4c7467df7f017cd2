//! Rendering of planned groups into `<link>` and `<style>` markup.

use crate::hooks::ConcatHooks;
use crate::identifier::{MtimeCache, identify};
use crate::models::{DoneSet, Group, GroupIdentifier, GroupKind, StyleResource};

/// Standard emission path for stylesheets served from their own source.
pub trait ItemRenderer {
  /// Markup for a single stylesheet.
  fn render_item(&self, resource: &StyleResource) -> String;
}

/// Renders plain `<link>` tags, wrapping conditional stylesheets in conditional comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardItemRenderer;

impl ItemRenderer for StandardItemRenderer {
  fn render_item(&self, resource: &StyleResource) -> String {
    let tag = format!(
      "<link rel='stylesheet' id='{id}-css' href='{href}' type='text/css' media='{media}' />\n",
      id = escape_attr(&resource.handle),
      href = escape_attr(&resource.src),
      media = escape_attr(resource.media()),
    );

    match resource.condition() {
      Some(condition) => format!("<!--[if {condition}]>\n{tag}<![endif]-->\n"),
      None => tag,
    }
  }
}

impl<T: ItemRenderer + ?Sized> ItemRenderer for &T {
  fn render_item(&self, resource: &StyleResource) -> String {
    (**self).render_item(resource)
  }
}

/// Output of one rendering pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
  /// Markup fragments in document order.
  pub markup: Vec<String>,
  /// Handles emitted by this pass.
  pub done: DoneSet,
}

impl Rendered {
  /// All fragments joined into one HTML string.
  pub fn html(&self) -> String {
    self.markup.concat()
  }
}

/// Turns groups into markup, pointing combined groups at the delivery endpoint.
pub struct MarkupEmitter<'a, H: ?Sized, I> {
  endpoint_url: &'a str,
  allow_gzip_compression: bool,
  hooks: &'a H,
  items: I,
}

impl<'a, H: ConcatHooks + ?Sized, I: ItemRenderer> MarkupEmitter<'a, H, I> {
  /// Emitter linking combined groups to `endpoint_url`.
  pub fn new(endpoint_url: &'a str, allow_gzip_compression: bool, hooks: &'a H, items: I) -> Self {
    Self {
      endpoint_url,
      allow_gzip_compression,
      hooks,
      items,
    }
  }

  /// Render every group in order.
  ///
  /// A combined group whose files can no longer be stat'ed is demoted: its members go
  /// through the single-item path instead of breaking the page.
  pub fn render(&self, groups: &[Group]) -> Rendered {
    let mut rendered = Rendered::default();
    let mut mtimes = MtimeCache::new();

    for group in groups {
      match group.kind {
        GroupKind::Singleton => self.render_singletons(group, &mut rendered),
        GroupKind::Combined => match identify(group, &mut mtimes) {
          Ok(identifier) => self.render_combined(group, &identifier, &mut rendered),
          Err(err) => {
            tracing::warn!(
              group = group.index,
              handles = ?group.handles(),
              error = %err,
              "demoting combined stylesheet group to individual links"
            );
            self.render_singletons(group, &mut rendered);
          }
        },
      }
    }

    rendered
  }

  /// Delivery URL for a combined group.
  pub fn href(&self, identifier: &GroupIdentifier) -> String {
    let separator = if self.endpoint_url.contains('?') { '&' } else { '?' };
    format!(
      "{endpoint}{separator}load={load}&m={mtime}&c={compress}",
      endpoint = self.endpoint_url,
      load = identifier.encoded_path_list,
      mtime = identifier.freshness,
      compress = u8::from(self.allow_gzip_compression),
    )
  }

  fn render_combined(&self, group: &Group, identifier: &GroupIdentifier, rendered: &mut Rendered) {
    let href = self.href(identifier);
    let media = escape_attr(&group.media);
    let tag = format!(
      "<link rel='stylesheet' id='{media}-css-{index}' href='{href}' type='text/css' media='{media}' />\n",
      index = group.index,
      href = escape_attr(&href),
    );
    let handles = group.handles();
    tracing::debug!(group = group.index, ?handles, "rendering combined stylesheet link");
    rendered
      .markup
      .push(self.hooks.link_tag(tag, &handles, &href, &group.media));

    for member in &group.members {
      push_inline(&member.resource, rendered);
    }
    for handle in handles {
      rendered.done.insert(handle);
    }
  }

  fn render_singletons(&self, group: &Group, rendered: &mut Rendered) {
    for member in &group.members {
      rendered.markup.push(self.items.render_item(&member.resource));
      push_inline(&member.resource, rendered);
      rendered.done.insert(member.handle());
    }
  }
}

fn push_inline(resource: &StyleResource, rendered: &mut Rendered) {
  if let Some(block) = render_inline_style(resource) {
    rendered.markup.push(block);
  }
}

/// `<style>` block carrying the inline CSS attached after `resource`, if any.
pub fn render_inline_style(resource: &StyleResource) -> Option<String> {
  let blocks: Vec<&str> = resource
    .inline_after
    .iter()
    .map(String::as_str)
    .filter(|css| !css.trim().is_empty())
    .collect();
  if blocks.is_empty() {
    return None;
  }

  Some(format!(
    "<style id='{id}-inline-css' type='text/css'>\n{css}\n</style>\n",
    id = escape_attr(&resource.handle),
    css = blocks.join("\n"),
  ))
}

fn escape_attr(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for ch in value.chars() {
    match ch {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#039;"),
      other => escaped.push(other),
    }
  }
  escaped
}
