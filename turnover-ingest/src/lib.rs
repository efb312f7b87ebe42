//! turnover-ingest: reservation feeds (Hostex API, CSV export) and the
//! adapter that turns their shapes into canonical bookings.

pub mod csv_source;
pub mod feed;
pub mod hostex;
pub mod normalize;
pub mod source;
pub mod types;

pub use csv_source::{CsvReservationSource, read_reservations_csv};
pub use feed::BookingFeed;
pub use hostex::HostexClient;
pub use normalize::{NormalizeError, NormalizedSnapshot, Normalizer};
pub use source::{PageLimits, ReservationQuery, ReservationSource, fetch_all};
pub use types::{CamelReservation, RawId, RawReservation, SnakeReservation};
