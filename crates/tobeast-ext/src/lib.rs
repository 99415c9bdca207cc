//! # tobeast-ext
//!
//! Optional converter bundles, loaded into a registry after the defaults:
//!
//! - [`sa`]: sampled-ancestor birth-death tree priors and their tree
//!   operators
//! - [`mascot`]: structured coalescent with per-deme population sizes and
//!   migration rates
//!
//! ```rust,ignore
//! use tobeast_core::{DefaultBundle, Registry};
//! use tobeast_ext::{SampledAncestorBundle, StructuredCoalescentBundle};
//!
//! let registry = Registry::from_bundles(&[
//!     &DefaultBundle,
//!     &SampledAncestorBundle,
//!     &StructuredCoalescentBundle,
//! ]);
//! ```

pub mod mascot;
pub mod sa;

pub use mascot::{MascotConverter, MascotTreeLogger, StructuredCoalescentBundle};
pub use sa::{SampledAncestorBundle, SampledAncestorConverter, SampledAncestorTreeStrategy};

use tobeast_core::{Bundle, DefaultBundle, Registry};

/// A registry with the default bundle and every extension bundle.
pub fn full_registry() -> Registry {
    let bundles: [&dyn Bundle; 3] = [
        &DefaultBundle,
        &SampledAncestorBundle,
        &StructuredCoalescentBundle,
    ];
    Registry::from_bundles(&bundles)
}
