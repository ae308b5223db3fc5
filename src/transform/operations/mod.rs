//! Operation registry
//!
//! A closed mapping from action names to image operations. Operations come in
//! two shapes: single-image operations take the current image and their
//! parameters, dual-image operations additionally receive a second decoded
//! image that the executor fetched from the step's first parameter.

pub mod blend;
pub mod color;
pub mod geometry;
pub mod params;

use image::DynamicImage;
use std::collections::HashMap;

use crate::transform::error::OperationError;
use crate::transform::handle::ImageHandle;
pub use params::Params;

/// Outcome of a single-image operation. `Some` carries a new image that
/// supersedes the current one, `None` means the image was mutated in place.
pub type StepResult = Result<Option<DynamicImage>, OperationError>;

pub type SingleFn = fn(&mut DynamicImage, Params<'_>) -> StepResult;
pub type DualFn = fn(&mut DynamicImage, &DynamicImage, Params<'_>) -> Result<(), OperationError>;

/// Names whose first parameter is the URL of a second image
pub const MULTI_IMAGE_OPERATIONS: &[&str] = &["watermark", "blend"];

#[derive(Clone, Copy)]
pub enum Operation {
    Single(SingleFn),
    Dual(DualFn),
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Single(_) => f.write_str("Operation::Single"),
            Operation::Dual(_) => f.write_str("Operation::Dual"),
        }
    }
}

impl Operation {
    pub fn is_dual(&self) -> bool {
        matches!(self, Operation::Dual(_))
    }

    /// Apply a single-image operation to the handle. A new image returned by
    /// the operation replaces the handle's buffer.
    pub fn apply_single(
        &self,
        handle: &mut ImageHandle,
        params: Params<'_>,
    ) -> Result<(), OperationError> {
        let Operation::Single(op) = self else {
            return Err(OperationError::Unsupported(
                "dual-image operation applied without a second image".to_string(),
            ));
        };
        let image = handle
            .image_mut()
            .map_err(|e| OperationError::Unsupported(e.to_string()))?;
        if let Some(next) = op(image, params)? {
            handle.replace(next);
        }
        Ok(())
    }

    /// Apply a dual-image operation. The secondary handle is consumed and
    /// released whether or not the operation succeeds.
    pub fn apply_dual(
        &self,
        handle: &mut ImageHandle,
        mut secondary: ImageHandle,
        params: Params<'_>,
    ) -> Result<(), OperationError> {
        let result = match self {
            Operation::Dual(op) => match (handle.image_mut(), secondary.image()) {
                (Ok(primary), Ok(overlay)) => op(primary, overlay, params),
                (Err(e), _) | (_, Err(e)) => Err(OperationError::Unsupported(e.to_string())),
            },
            Operation::Single(_) => Err(OperationError::Unsupported(
                "single-image operation given a second image".to_string(),
            )),
        };
        secondary.release();
        result
    }
}

/// Name → operation lookup, built once per process
#[derive(Debug)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, Operation>,
}

impl OperationRegistry {
    /// Registry with every built-in operation
    pub fn builtin() -> Self {
        let single: [(&'static str, SingleFn); 15] = [
            ("resize", geometry::resize),
            ("crop", geometry::crop),
            ("rotate", geometry::rotate),
            ("fliph", geometry::fliph),
            ("flipv", geometry::flipv),
            ("grayscale", color::grayscale),
            ("sepia", color::sepia),
            ("invert", color::invert),
            ("brighten", color::brighten),
            ("darken", color::darken),
            ("adjust_contrast", color::adjust_contrast),
            ("hue_rotate", color::hue_rotate),
            ("threshold", color::threshold),
            ("gaussian_blur", color::gaussian_blur),
            ("sharpen", color::sharpen),
        ];
        let dual: [(&'static str, DualFn); 2] =
            [("watermark", blend::watermark), ("blend", blend::blend)];

        let mut operations = HashMap::with_capacity(single.len() + dual.len());
        for (name, op) in single {
            operations.insert(name, Operation::Single(op));
        }
        for (name, op) in dual {
            operations.insert(name, Operation::Dual(op));
        }
        Self { operations }
    }

    pub fn resolve(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn is_multi_image(&self, name: &str) -> bool {
        MULTI_IMAGE_OPERATIONS.contains(&name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::handle::HandleLedger;

    #[test]
    fn test_multi_image_names_resolve_to_dual_operations() {
        let registry = OperationRegistry::builtin();
        for name in MULTI_IMAGE_OPERATIONS {
            assert!(registry.is_multi_image(name));
            assert!(registry.resolve(name).unwrap().is_dual());
        }
    }

    #[test]
    fn test_single_image_names() {
        let registry = OperationRegistry::builtin();
        for name in ["resize", "crop", "grayscale", "sharpen"] {
            assert!(!registry.is_multi_image(name));
            assert!(!registry.resolve(name).unwrap().is_dual());
        }
        assert_eq!(registry.len(), 17);
    }

    #[test]
    fn test_multi_image_set_matches_registered_dual_operations() {
        let registry = OperationRegistry::builtin();
        for name in registry.names() {
            let dual = registry.resolve(name).unwrap().is_dual();
            assert_eq!(registry.is_multi_image(name), dual, "{}", name);
        }
    }

    #[test]
    fn test_unknown_name_is_unresolved() {
        let registry = OperationRegistry::builtin();
        assert!(registry.resolve("sparkle").is_none());
        assert!(registry.resolve("Resize").is_none());
    }

    #[test]
    fn test_apply_single_replaces_buffer() {
        let ledger = HandleLedger::new();
        let mut handle = ImageHandle::from_image(DynamicImage::new_rgba8(8, 8), &ledger);
        let registry = OperationRegistry::builtin();
        let tokens = vec!["4".to_string(), "2".to_string()];

        registry
            .resolve("resize")
            .unwrap()
            .apply_single(&mut handle, Params::new(&tokens))
            .unwrap();

        assert_eq!(handle.dimensions(), Some((4, 2)));
        assert_eq!(ledger.acquired(), 2);
        assert_eq!(ledger.live(), 1);
    }

    #[test]
    fn test_apply_dual_releases_secondary_even_on_failure() {
        let ledger = HandleLedger::new();
        let mut handle = ImageHandle::from_image(DynamicImage::new_rgba8(4, 4), &ledger);
        let secondary = ImageHandle::from_image(DynamicImage::new_rgba8(2, 2), &ledger);
        let registry = OperationRegistry::builtin();
        let tokens = vec!["bogus".to_string()];

        let result = registry
            .resolve("blend")
            .unwrap()
            .apply_dual(&mut handle, secondary, Params::new(&tokens));

        assert!(result.is_err());
        assert_eq!(ledger.live(), 1);
        assert_eq!(handle.dimensions(), Some((4, 4)));
    }
}
