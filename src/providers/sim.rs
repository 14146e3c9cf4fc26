//! In-memory device libraries
//!
//! These stand in for the SLC device libraries so that the providers can be
//! run without the control system, from the command line and in tests.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    error::NativeStatus,
    providers::{
        buffacq::{AcquisitionRequest, BpmReading, BuffAcqLibrary},
        klystron::{KlystronLibrary, KlystronStatus},
        mosc::{MasterOscillatorLibrary, Units},
    },
    uri::Pmu,
    vms::{VaxD, VaxF},
};

/// Status returned by the simulators for any failure
pub const SIMULATED_FAILURE: u32 = 0x0A00_8002;

fn failure(text: String) -> NativeStatus {
    NativeStatus::new(SIMULATED_FAILURE, text)
}

/// A bank of klystrons, keyed by device name
#[derive(Debug, Clone)]
pub struct SimulatedKlystrons {
    access: bool,
    statuses: BTreeMap<String, i16>,
    configs: BTreeMap<(String, String), f32>,
    last_trim: Option<String>,
}

impl Default for SimulatedKlystrons {
    fn default() -> Self {
        Self {
            access: true,
            statuses: BTreeMap::new(),
            configs: BTreeMap::new(),
            last_trim: None,
        }
    }
}

impl SimulatedKlystrons {
    /// A few klystrons in sector 31, the first two accelerating
    pub fn sector() -> Self {
        Self::default()
            .with_klystron("KLYS:LI31:31", KlystronStatus::ACCEL | KlystronStatus::SLEDED)
            .with_klystron("KLYS:LI31:41", KlystronStatus::ACCEL | KlystronStatus::SLED_TUNED)
            .with_klystron("KLYS:LI31:51", KlystronStatus::STANDBY)
            .with_klystron("KLYS:LI31:61", KlystronStatus::STANDBY | KlystronStatus::BAD)
    }

    pub fn with_klystron(mut self, device: &str, status: i16) -> Self {
        self.statuses.insert(device.to_string(), status);
        self
    }

    pub fn with_access(mut self, access: bool) -> Self {
        self.access = access;
        self
    }

    pub fn status_of(&self, device: &str) -> Option<i16> {
        self.statuses.get(device).copied()
    }

    pub fn config(&self, device: &str, secn: &str) -> Option<f32> {
        self.configs
            .get(&(device.to_string(), secn.to_string()))
            .copied()
    }

    /// Trim passed to the most recent phase set
    pub fn last_trim(&self) -> Option<String> {
        self.last_trim.clone()
    }

    fn known<'a>(&self, name: &'a str) -> Result<&'a str, NativeStatus> {
        // Accept the SLC database form as well as the device name
        let device = name.split_once('.').map_or(name, |(d, _)| d);
        if self.statuses.contains_key(device) {
            Ok(device)
        } else {
            Err(failure(format!("No such klystron {device}")))
        }
    }
}

impl KlystronLibrary for SimulatedKlystrons {
    fn init(&mut self) -> Result<(), NativeStatus> {
        debug!("Simulating {} klystrons", self.statuses.len());
        Ok(())
    }

    fn access_enabled(&self) -> bool {
        self.access
    }

    fn status(&self, name: &str, _beam: &str, _dgrp: &str) -> Result<i16, NativeStatus> {
        let device = self.known(name)?;
        Ok(self.statuses.get(device).copied().unwrap_or_default())
    }

    fn set_config(&mut self, device: &str, value: VaxF, secn: &str) -> Result<(), NativeStatus> {
        let device = self.known(device)?.to_string();
        self.configs
            .insert((device, secn.to_string()), value.to_f32());
        Ok(())
    }

    fn set_trim_phase(
        &mut self,
        device: &str,
        _secn: &str,
        value: VaxF,
        trim: Option<&str>,
    ) -> Result<f32, NativeStatus> {
        self.known(device)?;
        self.last_trim = trim.map(str::to_string);
        Ok(value.to_f32())
    }

    fn set_deactivate_or_reactivate(
        &mut self,
        device: &str,
        activate: bool,
        _beam: &str,
    ) -> Result<(), NativeStatus> {
        let device = self.known(device)?.to_string();
        if let Some(status) = self.statuses.get_mut(&device) {
            *status = if activate {
                (*status & !KlystronStatus::STANDBY) | KlystronStatus::ACCEL
            } else {
                (*status & !KlystronStatus::ACCEL) | KlystronStatus::STANDBY
            };
        }
        Ok(())
    }
}

/// BPMs read by a simulated buffered acquisition
#[derive(Debug, Clone, Default)]
pub struct SimulatedBuffAcq {
    bpms: Vec<Pmu>,
    fail_reads: bool,
    selected: Vec<Pmu>,
    nrpos: usize,
    last_group: Option<String>,
    acquisitions: usize,
    terminations: usize,
}

impl SimulatedBuffAcq {
    /// Simulate the given BPMs, ignoring any name that is not a device
    pub fn new(bpms: &[&str]) -> Self {
        Self {
            bpms: bpms.iter().filter_map(|b| b.parse().ok()).collect(),
            ..Default::default()
        }
    }

    pub fn with_failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn last_group(&self) -> Option<&str> {
        self.last_group.as_deref()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    pub fn terminations(&self) -> usize {
        self.terminations
    }
}

impl BuffAcqLibrary for SimulatedBuffAcq {
    fn init(&mut self) -> Result<(), NativeStatus> {
        Ok(())
    }

    fn acquisition_init(&mut self) -> Result<(), NativeStatus> {
        self.acquisitions += 1;
        Ok(())
    }

    fn acquire(&mut self, request: &AcquisitionRequest) -> Result<usize, NativeStatus> {
        if let Some(unknown) = request.devices.iter().find(|d| !self.bpms.contains(d)) {
            return Err(failure(format!("No such BPM {unknown}")));
        }
        self.selected = if request.devices.is_empty() {
            self.bpms.clone()
        } else {
            request.devices.to_vec()
        };
        self.nrpos = usize::try_from(request.nrpos).unwrap_or_default();
        self.last_group = Some(request.group.to_string());
        Ok(self.selected.len() * self.nrpos)
    }

    fn readings(&mut self, rows: usize) -> Result<Vec<BpmReading>, NativeStatus> {
        if self.fail_reads {
            return Err(failure("BPM buffer read failed".to_string()));
        }
        let readings = (0..self.nrpos)
            .flat_map(|pulse| self.selected.iter().map(move |bpm| (pulse, bpm)))
            .take(rows)
            .map(|(pulse, bpm)| {
                let offset = bpm.unit as f32 / 1000.0;
                BpmReading {
                    name: bpm.to_string(),
                    pulse_id: i32::try_from(pulse).unwrap_or(i32::MAX),
                    x: VaxF::from(offset),
                    y: VaxF::from(-offset),
                    tmit: VaxF::from(1.0e10),
                    stat: 1,
                    good_measurement: 1,
                }
            })
            .collect();
        Ok(readings)
    }

    fn terminate(&mut self) {
        self.terminations += 1;
        self.selected.clear();
    }
}

/// A master oscillator that moves to wherever it is set
#[derive(Debug, Clone)]
pub struct SimulatedMasterOscillator {
    access: bool,
    frequency: f64,
    last_ring: Option<String>,
}

impl SimulatedMasterOscillator {
    pub fn new(frequency: f64) -> Self {
        Self {
            access: true,
            frequency,
            last_ring: None,
        }
    }

    pub fn with_access(mut self, access: bool) -> Self {
        self.access = access;
        self
    }

    pub fn last_ring(&self) -> Option<&str> {
        self.last_ring.as_deref()
    }
}

impl MasterOscillatorLibrary for SimulatedMasterOscillator {
    fn init(&mut self) -> Result<(), NativeStatus> {
        Ok(())
    }

    fn access_enabled(&self) -> bool {
        self.access
    }

    fn measured_frequency(&self) -> Result<VaxD, NativeStatus> {
        Ok(VaxD::from(self.frequency))
    }

    fn set(&mut self, value: f32, units: Units, ring: Option<&str>) -> Result<VaxD, NativeStatus> {
        let change = f64::from(value);
        self.frequency += match (units, ring) {
            (Units::Frequency, _) => change,
            // Energy changes scale per ring
            (Units::Energy, Some(ring)) if ring.eq_ignore_ascii_case("HER") => change * 1.0e-3,
            (Units::Energy, Some(ring)) if ring.eq_ignore_ascii_case("LER") => change * 2.0e-3,
            (Units::Energy, ring) => {
                return Err(failure(format!("No such ring {}", ring.unwrap_or_default())));
            }
        };
        self.last_ring = ring.map(str::to_string);
        Ok(VaxD::from(self.frequency))
    }
}
