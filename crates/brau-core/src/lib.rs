pub mod control_loop;
pub mod error;
pub mod filter;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod inputs;
pub mod limits;
pub mod logger;
pub mod optimizer;
pub mod orchestrator;
pub mod pi;
pub mod scheduler;
pub mod state;
pub mod supervisor;
pub mod tags;
pub mod task;
pub mod thermistor;
pub mod timebase;
pub mod vessel;

pub use control_loop::{ControlConfig, ExecutionStats, HeaterLoop};
pub use error::{ConfigError, ControlError, ControlResult, DeviceError, TaskKind};
pub use hal::{AnalogChannel, BrewDevice, DataFormat, DeviceHandle, DigitalLine, TemperatureUnit};
#[cfg(feature = "simulation")]
pub use hal_sim::{FaultSwitch, SimulatedBrewery};
pub use inputs::{InputField, StagedInputs};
pub use logger::{RecordSink, SampleRecord, SinkFactory};
pub use optimizer::{OptimizerWeights, Resolution};
pub use orchestrator::Orchestrator;
pub use state::{ControlLoopState, ControlSnapshot, SharedControlState};
pub use supervisor::{SafetyState, SafetySupervisor};
pub use thermistor::{BetaThermistor, Thermistor};
pub use timebase::TimeBase;
pub use vessel::{BoilMode, Vessel};
