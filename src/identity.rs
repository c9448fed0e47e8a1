use serde::{Deserialize, Serialize};

/// Identifier used for notes synthesized without a human behind them
pub const SYSTEM_ACTOR_ID: &str = "sys";

/// Whoever performs a mutating call; trusted as supplied by the identity layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(SYSTEM_ACTOR_ID, "Sistema")
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_ACTOR_ID
    }
}

/// Identity collaborator: supplies the actor for attribution
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Actor;
}

/// Identity taken from configuration, used by the CLI
#[derive(Debug, Clone)]
pub struct ConfiguredIdentity {
    actor: Actor,
}

impl ConfiguredIdentity {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_identity_hands_out_its_actor() {
        let identity = ConfiguredIdentity::new(Actor::new("u-7", "Beatriz"));
        let actor = identity.current_actor();
        assert_eq!(actor.display_name, "Beatriz");
        assert!(!actor.is_system());
        assert!(Actor::system().is_system());
    }
}
