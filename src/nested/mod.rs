//! Bayesian fitting by nested sampling.
//!
//! The free parameters of a [`ParameterTable`](crate::parameters::ParameterTable)
//! are sampled through their priors with [`NestedSamplingDriver`]. The
//! sampler itself ([`NestedSampler`]) works on any prior transform and
//! log-likelihood closure pair.

pub mod driver;
pub mod likelihood;
pub mod prior_transform;
pub mod results;
pub mod sampler;

pub use driver::{nested_sample, NestedOptions, NestedSamplingDriver};
pub use likelihood::LogLikelihood;
pub use prior_transform::PriorTransform;
pub use results::PosteriorResult;
pub use sampler::{log_add_exp, NestedSampler, SamplerConfig, SamplerOutput};
