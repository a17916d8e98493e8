//! Toyjam: installation playback daemon
//!
//! Six slots, each with a trigger line that reads LOW while an object sits
//! on it. The first insertion starts a session: a two-track ambience bed
//! plus six foreground loops, all started together with only the occupied
//! slots audible. An analog sensor sets the balance between the two halves
//! of the bed. The session ends on its own after a period without new
//! insertions.
//!
//! Layering, bottom up:
//!
//! - **audio**: the [`AudioEngine`] seam and the [`AudioChannelPool`] that
//!   owns live voices
//! - **sensor**: edge queue, line mapping, analog reads, hardware adapters
//! - **debounce** / **crossfade**: per-slot quiet window, bed balance
//! - **session**: the state machine that decides what plays
//! - **system** / **scheduler**: owned state and the loop that drives it

pub mod assets;
pub mod audio;
pub mod crossfade;
pub mod debounce;
pub mod scheduler;
pub mod sensor;
pub mod session;
pub mod slot;
pub mod startup;
pub mod system;

pub use assets::{Asset, AssetError, AssetLibrary};
pub use audio::{AudioChannelPool, AudioEngine, ChannelHandle, MemoryEngine, PlaybackError, VoiceId};
#[cfg(feature = "rodio")]
pub use audio::RodioEngine;
pub use crossfade::{Blend, CrossfadeController};
pub use debounce::DebounceFilter;
pub use scheduler::MainLoop;
pub use sensor::{
    edge_queue, AnalogReader, AnalogSensor, ConsoleSensors, EdgeEvent, EdgeSender, IioAdc,
    LineMap, SensorError, SensorRelease, SharedDial, SysfsGpio,
};
pub use session::{SessionState, SessionStateMachine};
pub use slot::{Level, Side, SlotId, TrackId, SLOT_COUNT};
pub use startup::{init_with_retry, spawn_startup_chime, InitOutcome, RetryPolicy};
pub use system::{Snapshot, SystemState};
