pub mod booking;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod history;
pub mod notification;
pub mod transitions;

pub use booking::BookingMaterializer;
pub use engine::{ConfirmPayload, EngineConfig, Quote, TransitionPayload, WorkflowEngine};
pub use error::{SideEffect, WorkflowError, WorkflowResult};
pub use gateway::StoreGateway;
pub use history::AuditTrail;
pub use notification::{NotificationDispatcher, NotificationTemplate};
pub use transitions::TransitionRule;
