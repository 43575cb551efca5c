pub mod actor;
pub mod booking;
pub mod history;
pub mod itinerary;
pub mod notification;
pub mod request;
pub mod status;

pub use actor::{Actor, Role};
pub use booking::{BookingStatus, DerivedBooking};
pub use history::StatusHistoryEntry;
pub use itinerary::ItinerarySummary;
pub use notification::{CustomerNotification, NotificationKind};
pub use request::{ContactDetails, ItineraryRequest, NewItineraryRequest, RequestFilter, StatusUpdate};
pub use status::{PaymentStatus, RequestStatus, UnknownStatus};
