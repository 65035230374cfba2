pub mod location;
pub mod ride;
pub mod telemetry;
pub mod user;
pub mod vehicle;

pub use location::LocationHistory;
pub use ride::{ActiveRide, ClosedRide, Ride, RideSummary};
pub use user::User;
pub use vehicle::{NewVehicle, PurchaseInformation, Vehicle, VehicleInfo, VehicleWithLocation};
