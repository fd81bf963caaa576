//! BRDF models that can be fitted with linearly transformed cosines.
//!
//! Every model implements [`Brdf`]: evaluation of the cosine-weighted BRDF for a
//! view/light pair together with the pdf of its own importance sampling
//! routine. The fitter only ever talks to models through that trait, so adding
//! a model means adding a file here and one line in [`ModelRegistry::builtin`].

pub mod brdf;
pub mod charlie;
pub mod cook_torrance;
pub mod ggx;
pub mod lambert;
pub mod registry;

pub use brdf::*;
pub use charlie::*;
pub use cook_torrance::*;
pub use ggx::*;
pub use lambert::*;
pub use registry::*;
