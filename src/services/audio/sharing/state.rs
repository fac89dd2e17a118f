use std::fmt;

/// Lifecycle state of audio sharing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SharingState {
    /// No aggregate sink exists
    #[default]
    Inactive,
    /// The sink is being built
    Starting,
    /// The sink exists and is the default output
    Active,
    /// The sink is being torn down
    Stopping,
}

impl SharingState {
    /// Whether a setup or teardown is running
    pub fn is_transitional(self) -> bool {
        matches!(self, SharingState::Starting | SharingState::Stopping)
    }

    /// Resolve `trigger` against this state
    pub fn on(self, trigger: Trigger) -> Transition {
        use SharingState::*;
        use Trigger::*;

        match (self, trigger) {
            (Inactive, StartRequested) => Transition::Move {
                to: Starting,
                action: Some(Action::Setup),
            },
            (Starting, SetupSucceeded) => Transition::Move {
                to: Active,
                action: None,
            },
            (Starting, SetupFailed) => Transition::Move {
                to: Inactive,
                action: None,
            },
            (Active, StopRequested | ForcedInvalidation) => Transition::Move {
                to: Stopping,
                action: Some(Action::Teardown),
            },
            (Stopping, TeardownComplete) => Transition::Move {
                to: Inactive,
                action: None,
            },
            (Inactive | Stopping, StopRequested | ForcedInvalidation) => Transition::Ignore,
            (Starting | Stopping, StartRequested) => Transition::Busy,
            (Starting, StopRequested | ForcedInvalidation) => Transition::Defer,
            _ => Transition::Invalid,
        }
    }
}

impl fmt::Display for SharingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SharingState::Inactive => "inactive",
            SharingState::Starting => "starting",
            SharingState::Active => "active",
            SharingState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Inputs of the sharing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A collaborator asked to start sharing
    StartRequested,
    /// The aggregate sink was built
    SetupSucceeded,
    /// Building the aggregate sink failed
    SetupFailed,
    /// A collaborator asked to stop sharing
    StopRequested,
    /// The sink was torn down, successfully or not
    TeardownComplete,
    /// A shared device disappeared while active
    ForcedInvalidation,
}

impl Trigger {
    /// Every trigger
    pub const ALL: [Trigger; 6] = [
        Trigger::StartRequested,
        Trigger::SetupSucceeded,
        Trigger::SetupFailed,
        Trigger::StopRequested,
        Trigger::TeardownComplete,
        Trigger::ForcedInvalidation,
    ];
}

/// Work the coordinator has to run after entering a new state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Build the aggregate sink
    Setup,
    /// Restore the default output and destroy the sink
    Teardown,
}

/// Outcome of applying a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Enter `to`, then run `action`
    Move {
        /// Next state
        to: SharingState,
        /// Operation to start
        action: Option<Action>,
    },
    /// Repeated stop; nothing to do
    Ignore,
    /// A start arrived while a setup or teardown is running
    Busy,
    /// A stop arrived during setup; apply it once setup resolves
    Defer,
    /// The trigger is meaningless in this state
    Invalid,
}
