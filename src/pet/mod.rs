//! Pet session coordination.

mod controller;
pub mod guards;
pub mod scope;
pub mod state;

pub use self::controller::{LEVEL_UP_GROWTH_THRESHOLD, PetSessionController};
pub use self::guards::{BusyFlags, BusyPermit, Operation, OperationGuards};
pub use self::scope::OperationScope;
pub use self::state::{
    Attribute, AttributeSlot, AttributeView, OperationOutcome, PetSession, PetSnapshot, PetState,
    PetStatusRead,
};
