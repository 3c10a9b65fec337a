//! Built-in validation stages, in pipeline order.

pub mod application;
pub mod authorization;
pub mod structural;

pub use application::ApplicationStage;
pub use authorization::AuthorizationStage;
pub use structural::StructuralStage;
