//! Engine error type.

use crate::actor::ActorId;

/// Errors raised synchronously by the call that caused them.
///
/// No-op conditions (forces on a static body, removing a listener twice) are
/// not errors and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("actor {0} is already live in a scene")]
    ActorAlreadyInScene(ActorId),
    #[error("actor {0} is not live in this scene")]
    ActorNotInScene(ActorId),
    #[error("dynamic body of actor {actor} has no mass (density {density}, area {area})")]
    ZeroMass {
        actor: ActorId,
        density: f64,
        area: f64,
    },
    #[error("joint actors must both be live in the same scene")]
    JointActorsNotColocated,
    #[error("joint cannot connect an actor to itself")]
    JointSelfReference,
    #[error("prismatic joint axis must be non-zero and finite")]
    InvalidJointAxis,
    #[error("actor {0} has no dynamic body")]
    NotDynamic(ActorId),
    #[error("invalid periodic task: {0}")]
    InvalidTask(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
