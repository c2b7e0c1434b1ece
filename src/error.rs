use crate::sprite::AnimationName;
use crate::stage::EntityId;
use thiserror::Error;

/// Failures of engine calls made by the host.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("no live entity with id {0}")]
    UnknownEntity(EntityId),
    #[error("no character type named '{0}'")]
    UnknownKind(String),
    #[error("'{kind}' has no '{animation}' animation")]
    UnknownAnimation {
        kind: String,
        animation: AnimationName,
    },
    #[error("'{0}' is not an animation name")]
    UnrecognizedAnimation(String),
}

/// Content errors found while validating a [`CharacterSpec`](crate::sprite::CharacterSpec).
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("'{kind}' is missing the required '{animation}' animation")]
    MissingAnimation {
        kind: String,
        animation: AnimationName,
    },
    #[error("'{kind}' {animation}: frame_count must be positive")]
    EmptyAnimation {
        kind: String,
        animation: AnimationName,
    },
    #[error("'{kind}' {animation}: frame_duration_ms must be positive")]
    ZeroFrameDuration {
        kind: String,
        animation: AnimationName,
    },
    #[error("'{kind}' {animation}: hit frame {hit_frame} is outside 0..{frame_count}")]
    HitFrameOutOfRange {
        kind: String,
        animation: AnimationName,
        hit_frame: u32,
        frame_count: u32,
    },
    #[error("'{kind}' {animation}: a {columns}x{rows} grid cannot hold {frame_count} frames")]
    GridTooSmall {
        kind: String,
        animation: AnimationName,
        columns: u32,
        rows: u32,
        frame_count: u32,
    },
    #[error("'{kind}': scale must be positive, got {scale}")]
    BadScale { kind: String, scale: f64 },
    #[error("'{kind}': max_health must be positive")]
    NoHealth { kind: String },
    #[error("'{kind}': follow-up chance {chance} is outside 0..=1")]
    BadChance { kind: String, chance: f64 },
    #[error("'{kind}': flee threshold {ratio} is outside 0..1")]
    BadFleeThreshold { kind: String, ratio: f64 },
    #[error("character type '{0}' is defined twice")]
    DuplicateKind(String),
}
