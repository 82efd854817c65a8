use thiserror::Error;

/// Problems detected while building a scene, before the first frame runs.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid scene XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{tag}> tag is missing in {context}")]
    MissingTag { context: String, tag: &'static str },
    #[error("<{tag}> in {context} is not a valid {expected}: {value:?}")]
    InvalidValue {
        context: String,
        tag: String,
        expected: &'static str,
        value: String,
    },
    #[error("unknown transform step <{tag}> in object {object}")]
    UnknownStep { object: String, tag: String },
    #[error("object {object}: scale step {step} has a zero or vanishing component {scale:?}")]
    ZeroScale {
        object: String,
        step: usize,
        scale: [f32; 3],
    },
    #[error("object {object}: placement matrix is not invertible")]
    Singular { object: String },
    #[error("object {object}: step {step} has a degenerate axis")]
    DegenerateAxis { object: String, step: usize },
    #[error("object {object}: step {step} contains a non-finite value")]
    NonFinite { object: String, step: usize },
    #[error("light {index}: {reason}")]
    InvalidOrbit { index: usize, reason: String },
    #[error("lighting profile contains a non-finite value")]
    NonFiniteProfile,
    #[error("inner cone angle {inner}° must not exceed outer cone angle {outer}° (both below 90°)")]
    InvertedCone { inner: f32, outer: f32 },
    #[error("scene declares {count} lights but at most {max} are supported")]
    TooManyLights { count: usize, max: usize },
}
