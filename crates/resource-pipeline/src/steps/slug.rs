use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::ApiResource;
use async_trait::async_trait;
use std::marker::PhantomData;
use tracing::debug;

pub const MAX_SLUG_LEN: usize = 63;

/// Derives a URL-safe slug from a display name.
///
/// Lowercases, turns every character outside `[a-z0-9]` into a hyphen, collapses hyphen runs
/// and trims them from both ends, then caps the length at [`MAX_SLUG_LEN`]. Applying it to its
/// own output changes nothing.
///
/// ```
/// use resource_pipeline::steps::slugify;
///
/// assert_eq!(slugify("My Agent"), "my-agent");
/// assert_eq!(slugify("  --Hello,  World!-- "), "hello-world");
/// assert_eq!(slugify(&slugify("Déjà Vu 2")), slugify("Déjà Vu 2"));
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        // ASCII only, so any byte index is a char boundary.
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Fills `metadata.slug` on the working state from its name. A slug that is already set is
/// left alone.
pub struct ResolveSlugStep<R> {
    _resource: PhantomData<fn() -> R>,
}

impl<R> ResolveSlugStep<R> {
    pub fn new() -> Self {
        Self {
            _resource: PhantomData,
        }
    }
}

impl<R> Default for ResolveSlugStep<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for ResolveSlugStep<R> {
    fn name(&self) -> &'static str {
        "ResolveSlug"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let meta = ctx.new_state_mut()?.metadata_mut();
        if !meta.slug.is_empty() {
            return Ok(());
        }
        if meta.name.trim().is_empty() {
            return Err(PipelineError::invalid(
                "metadata.name is required to derive a slug",
            ));
        }
        let slug = slugify(&meta.name);
        if slug.is_empty() {
            return Err(PipelineError::invalid(format!(
                "metadata.name '{}' has no characters usable in a slug",
                meta.name
            )));
        }
        debug!(%slug, "Resolved slug");
        meta.slug = slug;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_rules() {
        assert_eq!(slugify("My Agent"), "my-agent");
        assert_eq!(slugify("code_reviewer v2.0"), "code-reviewer-v2-0");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("ALLCAPS"), "allcaps");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        for name in [
            "My Agent",
            "  spaced  out  ",
            "Ünïcödé name",
            "already-a-slug",
            &"x y ".repeat(40),
        ] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once, "{name:?}");
        }
    }

    #[test]
    fn test_slugify_caps_length_without_trailing_hyphen() {
        let name = format!("{} tail", "a".repeat(62));
        let slug = slugify(&name);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "a".repeat(62));
    }
}
