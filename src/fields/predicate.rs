//! Parsed field selections
//!
//! [`Fields`] is one level of a parsed selector. Nested levels hang off the
//! names that carried a block, so `first[second[!third]]` becomes three
//! levels. Presets are kept by name; only the resolver knows which
//! properties they stand for.

use indexmap::{IndexMap, IndexSet};

use super::parser::ParseErrorKind;
use super::transform::Transform;

/// One level of a field selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    all: bool,
    presets: IndexSet<String>,
    included: IndexMap<String, Option<Fields>>,
    excluded: IndexSet<String>,
    transforms: IndexMap<String, Vec<Transform>>,
}

impl Fields {
    /// Selection equivalent to `*`
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Whether nothing at all was selected at this level
    pub fn is_empty(&self) -> bool {
        !self.all && self.presets.is_empty() && self.included.is_empty() && self.excluded.is_empty()
    }

    /// Whether this level was selected with `*` or `:all`
    pub fn is_all(&self) -> bool {
        self.all
    }

    /// Whether this level means "everything but the excluded names"
    ///
    /// An empty level also counts: nothing was narrowed down.
    pub fn is_exclusion_only(&self) -> bool {
        !self.all && self.presets.is_empty() && self.included.is_empty()
    }

    pub fn presets(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(String::as_str)
    }

    /// Explicitly included names in request order
    pub fn included_names(&self) -> impl Iterator<Item = &str> {
        self.included.keys().map(String::as_str)
    }

    pub fn excluded_names(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    pub fn is_explicit(&self, name: &str) -> bool {
        self.included.contains_key(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    /// Test a direct child name without schema knowledge
    ///
    /// Exclusion always wins. Presets are not expanded here, so a level made
    /// only of presets reports `false` for names it does not list.
    pub fn test(&self, name: &str) -> bool {
        if self.excluded.contains(name) {
            return false;
        }
        self.all || self.included.contains_key(name) || self.is_exclusion_only()
    }

    /// The block given for `name`, if any
    pub fn children(&self, name: &str) -> Option<&Fields> {
        self.included.get(name).and_then(Option::as_ref)
    }

    /// Transforms declared for `name`, `rename` last
    pub fn transforms(&self, name: &str) -> &[Transform] {
        self.transforms.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Test a dotted path like `first.second.third`
    ///
    /// A name included without a block includes everything below it.
    pub fn includes(&self, path: &str) -> bool {
        let mut level = self;
        let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            if !level.test(segment) {
                return false;
            }
            match level.children(segment) {
                Some(next) => level = next,
                None => return true,
            }
            if segments.peek().is_none() {
                return true;
            }
        }
        true
    }

    /// The only plainly requested name, when exactly one was given
    pub fn single_field(&self) -> Option<&str> {
        if self.all || !self.presets.is_empty() || !self.excluded.is_empty() {
            return None;
        }
        if self.included.len() != 1 {
            return None;
        }
        self.included.keys().next().map(String::as_str)
    }

    pub(crate) fn set_all(&mut self) {
        self.all = true;
    }

    pub(crate) fn add_preset(&mut self, preset: String) {
        self.presets.insert(preset);
    }

    pub(crate) fn exclude(&mut self, name: String) {
        self.excluded.insert(name);
    }

    /// Include `name`, merging `block` into an earlier block of the same name
    pub(crate) fn include(
        &mut self,
        name: String,
        block: Option<Fields>,
        transforms: Vec<Transform>,
    ) -> Result<(), ParseErrorKind> {
        let entry = self.included.entry(name.clone()).or_insert(None);
        if let Some(block) = block {
            match *entry {
                Some(ref mut existing) => existing.merge(block)?,
                None => *entry = Some(block),
            }
        }

        if !transforms.is_empty() {
            let list = self.transforms.entry(name.clone()).or_default();
            list.extend(transforms);
            check_transforms(&name, list)?;
        }
        Ok(())
    }

    /// Merge another level into this one
    pub(crate) fn merge(&mut self, other: Fields) -> Result<(), ParseErrorKind> {
        self.all |= other.all;
        self.presets.extend(other.presets);
        self.excluded.extend(other.excluded);
        let mut transforms = other.transforms;
        for (name, block) in other.included {
            let list = transforms.shift_remove(&name).unwrap_or_default();
            self.include(name, block, list)?;
        }
        Ok(())
    }
}

/// Reject duplicates and competing value transforms, then move `rename` last
fn check_transforms(field: &str, list: &mut [Transform]) -> Result<(), ParseErrorKind> {
    for (i, transform) in list.iter().enumerate() {
        if list[..i].iter().any(|t| t.name() == transform.name()) {
            return Err(ParseErrorKind::DuplicateTransforms {
                field: field.to_string(),
                transform: transform.name().to_string(),
            });
        }
    }

    let mut values = list.iter().filter(|t| !t.is_rename());
    if let (Some(first), Some(second)) = (values.next(), values.next()) {
        return Err(ParseErrorKind::ConflictingTransforms {
            field: field.to_string(),
            first: first.name().to_string(),
            second: second.name().to_string(),
        });
    }

    list.sort_by_key(Transform::is_rename);
    Ok(())
}
