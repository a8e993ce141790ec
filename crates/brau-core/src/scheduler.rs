//! Turning a resolved duty cycle pair into ON/OFF timing within one period.
//!
//! A [`SchedulePlan`] is the full phase sequence for both heater lines. Each
//! heater task plays back only its own line of the plan, so both tasks agree
//! on where every phase sits in the period without talking to each other.

use crate::error::{ControlError, ControlResult, DeviceError};
use crate::hal::{BrewDevice, DeviceHandle, DigitalLine};
use crate::timebase::sleep_until;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// Slack allowed when checking whether two fractions fill the period exactly.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// `fraction` of `period`, rounded to the nanosecond.
fn fraction_of(period: Duration, fraction: f64) -> Duration {
    Duration::from_nanos((period.as_nanos() as f64 * fraction).round() as u64)
}

/// Heater line states held for `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub mash_heater: bool,
    pub boil_heater: bool,
    pub duration: Duration,
}

impl Phase {
    fn new(mash_heater: bool, boil_heater: bool, duration: Duration) -> Self {
        Self {
            mash_heater,
            boil_heater,
            duration,
        }
    }

    pub fn line(&self, line: DigitalLine) -> bool {
        match line {
            DigitalLine::MashHeater => self.mash_heater,
            DigitalLine::BoilHeater => self.boil_heater,
            DigitalLine::Pump => false,
        }
    }
}

/// A single output write at an offset from the period start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Duration,
    pub line: DigitalLine,
    pub on: bool,
}

/// Stretch of constant state for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: Duration,
    pub end: Duration,
    pub on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePlan {
    phases: Vec<Phase>,
}

impl SchedulePlan {
    /// Builds the phase sequence for resolved fractions `mash`, `boil`.
    ///
    /// The pair must already respect the shared feed (`mash + boil <= 1`).
    pub fn build(mash: f64, boil: f64, period: Duration) -> ControlResult<Self> {
        let valid = mash.is_finite()
            && boil.is_finite()
            && (0.0..=1.0).contains(&mash)
            && (0.0..=1.0).contains(&boil)
            && mash + boil <= 1.0 + SUM_TOLERANCE;
        if !valid {
            return Err(ControlError::Oversubscribed { mash, boil });
        }

        let t_on_m = fraction_of(period, mash);
        let t_on_b = fraction_of(period, boil);
        let t_off_m = period.saturating_sub(t_on_m);
        let t_off_b = period.saturating_sub(t_on_b);

        let phases = if mash == 0.0 && boil == 0.0 {
            vec![Phase::new(false, false, period)]
        } else if mash == 1.0 && boil == 0.0 {
            vec![Phase::new(true, false, period)]
        } else if mash == 0.0 && boil == 1.0 {
            vec![Phase::new(false, true, period)]
        } else if boil == 0.0 {
            vec![
                Phase::new(true, false, t_on_m),
                Phase::new(false, false, t_off_m),
            ]
        } else if mash == 0.0 {
            vec![
                Phase::new(false, true, t_on_b),
                Phase::new(false, false, t_off_b),
            ]
        } else if (mash + boil - 1.0).abs() <= SUM_TOLERANCE {
            vec![
                Phase::new(true, false, t_on_m),
                Phase::new(false, true, t_off_m),
            ]
        } else {
            // The idle gap sits between the two ON phases.
            let gap = if t_on_m > t_on_b {
                t_on_m - t_on_b
            } else {
                t_on_b - t_on_m
            };
            vec![
                Phase::new(true, false, t_on_m),
                Phase::new(false, false, gap),
                Phase::new(false, true, t_on_b),
            ]
        };
        Ok(Self { phases })
    }

    /// Both heaters OFF for the whole period.
    pub fn idle(period: Duration) -> Self {
        Self {
            phases: vec![Phase::new(false, false, period)],
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Wall-clock length of the sequence.
    pub fn duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Total ON time of `line` across the sequence.
    pub fn on_time(&self, line: DigitalLine) -> Duration {
        self.phases
            .iter()
            .filter(|p| p.line(line))
            .map(|p| p.duration)
            .sum()
    }

    /// Constant-state stretches of `line`, zero-length phases dropped.
    pub fn segments(&self, line: DigitalLine) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut offset = Duration::ZERO;
        for phase in &self.phases {
            if phase.duration.is_zero() {
                continue;
            }
            let end = offset + phase.duration;
            let on = phase.line(line);
            match segments.last_mut() {
                Some(last) if last.on == on => last.end = end,
                _ => segments.push(Segment {
                    start: offset,
                    end,
                    on,
                }),
            }
            offset = end;
        }
        segments
    }

    /// Every write the sequence issues, in order. Both lines are written at
    /// the period start; at a shared instant OFF writes precede ON writes.
    /// Playback runs each line on its own task, so that order is held by
    /// [`DeviceHandle::write_digital`], which opens the partner relay before
    /// closing a heater.
    pub fn transitions(&self) -> Vec<Transition> {
        let mut out = Vec::new();
        let mut offset = Duration::ZERO;
        let mut current: Option<(bool, bool)> = None;
        for phase in &self.phases {
            if phase.duration.is_zero() {
                continue;
            }
            let mut writes = Vec::with_capacity(2);
            for line in [DigitalLine::MashHeater, DigitalLine::BoilHeater] {
                let on = phase.line(line);
                let previous = current.map(|(m, b)| match line {
                    DigitalLine::MashHeater => m,
                    _ => b,
                });
                if previous != Some(on) {
                    writes.push(Transition {
                        at: offset,
                        line,
                        on,
                    });
                }
            }
            writes.sort_by_key(|t| t.on);
            out.extend(writes);
            current = Some((phase.mash_heater, phase.boil_heater));
            offset += phase.duration;
        }
        out
    }
}

/// How a playback of one line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRun {
    Completed,
    Stopped,
}

/// Plays back `line` of `plan` starting at `start`, blocking the caller for
/// each segment. `written` sees every level written to the line. Returns
/// early once `stop` is raised; the caller then forces the line OFF.
pub fn run_line<D: BrewDevice>(
    plan: &SchedulePlan,
    line: DigitalLine,
    start: Instant,
    device: &DeviceHandle<D>,
    stop: &AtomicBool,
    mut written: impl FnMut(bool),
) -> Result<LineRun, DeviceError> {
    for segment in plan.segments(line) {
        if stop.load(std::sync::atomic::Ordering::Relaxed) {
            return Ok(LineRun::Stopped);
        }
        device.write_digital(line, segment.on)?;
        written(segment.on);
        if !sleep_until(start + segment.end, stop) {
            return Ok(LineRun::Stopped);
        }
    }
    Ok(LineRun::Completed)
}
