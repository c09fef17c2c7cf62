// ── Reactive state ──
//
// Every value the presentation layer observes lives in `EnergyStore`
// behind a `watch` channel. Request sequencing and single-flight guards
// sit next to it because every write goes through them.

mod energy_store;
mod sequence;

pub use energy_store::{AuxSource, EnergyStore, LoadState, LocalReadings, MeterReadings};
pub use sequence::{FlightGuard, RequestSequencer};
