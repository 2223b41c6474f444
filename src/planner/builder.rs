//! Builder pattern for Planner.

use crate::config::{validate_config, PlannerConfig};
use crate::error::{ConfigError, Error, Result};
use crate::motion::{Coupling, JunctionPolicyKind, ProfileModel};

use super::buffer::Producer;
use super::kinematics::{Cartesian, Kinematics};
use super::stepper::Stepper;
use super::Planner;

/// Builder for creating Planner instances.
pub struct PlannerBuilder<S, K = Cartesian> {
    config: Option<PlannerConfig>,
    stepper: Option<S>,
    kinematics: K,
    coupling: Option<(Coupling, bool)>,
    junction_policy: Option<JunctionPolicyKind>,
    profile: Option<ProfileModel>,
    split_first_move: Option<bool>,
}

impl<S> Default for PlannerBuilder<S, Cartesian> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PlannerBuilder<S, Cartesian> {
    /// Create a new builder with Cartesian kinematics.
    pub fn new() -> Self {
        Self {
            config: None,
            stepper: None,
            kinematics: Cartesian,
            coupling: None,
            junction_policy: None,
            profile: None,
            split_first_move: None,
        }
    }
}

impl<S, K> PlannerBuilder<S, K> {
    /// Configure from a PlannerConfig.
    pub fn from_config(mut self, config: &PlannerConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Set the step generator.
    pub fn stepper(mut self, stepper: S) -> Self {
        self.stepper = Some(stepper);
        self
    }

    /// Set the kinematics handler.
    pub fn kinematics<K2>(self, kinematics: K2) -> PlannerBuilder<S, K2> {
        PlannerBuilder {
            config: self.config,
            stepper: self.stepper,
            kinematics,
            coupling: self.coupling,
            junction_policy: self.junction_policy,
            profile: self.profile,
            split_first_move: self.split_first_move,
        }
    }

    /// Override the motor coupling.
    pub fn coupling(mut self, coupling: Coupling, reversed: bool) -> Self {
        self.coupling = Some((coupling, reversed));
        self
    }

    /// Override the junction policy.
    pub fn junction_policy(mut self, policy: JunctionPolicyKind) -> Self {
        self.junction_policy = Some(policy);
        self
    }

    /// Override the velocity profile model.
    pub fn profile(mut self, profile: ProfileModel) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Override first-move splitting.
    pub fn split_first_move(mut self, enabled: bool) -> Self {
        self.split_first_move = Some(enabled);
        self
    }

    /// Build the Planner on the producer side of a queue.
    ///
    /// Without a configuration the defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the stepper is missing, the queue has fewer than
    /// two slots or the configuration is invalid.
    pub fn build<'q, const N: usize>(self, queue: Producer<'q, N>) -> Result<Planner<'q, S, K, N>>
    where
        S: Stepper,
        K: Kinematics,
    {
        let stepper = self
            .stepper
            .ok_or(Error::Config(ConfigError::MissingField("stepper")))?;
        if N < 2 {
            return Err(Error::Config(ConfigError::InvalidQueueSize(N)));
        }

        let mut config = self.config.unwrap_or_default();
        if let Some((coupling, reversed)) = self.coupling {
            config.motion.coupling = coupling;
            config.motion.coupling_reversed = reversed;
        }
        if let Some(policy) = self.junction_policy {
            config.motion.junction.policy = policy;
        }
        if let Some(profile) = self.profile {
            config.motion.profile = profile;
        }
        if let Some(split) = self.split_first_move {
            config.motion.split_first_move = split;
        }
        validate_config(&config)?;

        info!(
            "planner ready: {} slots, {} extruders",
            N,
            config.extruder_count()
        );
        Ok(Planner::new(config, queue, stepper, self.kinematics))
    }
}
