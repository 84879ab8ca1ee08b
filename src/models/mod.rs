// Models module - Database entity representations

pub mod audit_event;
pub mod event;
pub mod notification;
pub mod order;
pub mod profile;
pub mod ticket;
pub mod ticket_upload;
pub mod wallet_movement;

pub use audit_event::{AuditEntry, AuditEvent};
pub use event::{CreateEventData, Event};
pub use notification::{CreateNotificationData, Notification};
pub use order::{CreateOrderData, Order, OrderStatus, PaymentState};
pub use profile::{CreateProfileData, Profile, Role};
pub use ticket::{CreateTicketData, Ticket, TicketStatus};
pub use ticket_upload::{CreateUploadData, TicketUpload};
pub use wallet_movement::{MovementDirection, MovementKind, MovementStatus, WalletMovement};
