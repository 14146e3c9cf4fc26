//! Master oscillator frequency
//!
//! The oscillator is read as a double, or a one cell table, and set with
//! a response of the frequency it ended up at. A set is given either as a
//! frequency change or, for one of the rings, as an energy change.

use tracing::debug;

use crate::{
    arguments::Arguments,
    error::{AidaError, ExceptionKind, NativeStatus},
    providers::ChannelProvider,
    scanner::{FieldSpec, Scanner},
    table::{Table, single_value_table},
    types::AidaType,
    value::Value,
    vms::VaxD,
};

/// Units of a master oscillator set request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Units {
    Frequency,
    Energy,
}

impl Units {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frequency => "FREQUENCY",
            Self::Energy => "ENERGY",
        }
    }
}

/// The master oscillator control library
pub trait MasterOscillatorLibrary: Send + Sync + 'static {
    fn init(&mut self) -> Result<(), NativeStatus>;

    fn access_enabled(&self) -> bool;

    fn measured_frequency(&self) -> Result<VaxD, NativeStatus>;

    /// Change the oscillator, returning the new measured frequency
    fn set(&mut self, value: f32, units: Units, ring: Option<&str>) -> Result<VaxD, NativeStatus>;
}

pub struct MasterOscillatorProvider<L: MasterOscillatorLibrary> {
    library: L,
}

impl<L: MasterOscillatorLibrary> MasterOscillatorProvider<L> {
    pub fn new(library: L) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    fn frequency(&self) -> Result<f64, AidaError> {
        if !self.library.access_enabled() {
            return Err(AidaError::unable_to_get(
                "Aida access to master oscillator is not currently enabled",
            ));
        }
        self.library
            .measured_frequency()
            .map(f64::from)
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToGetData,
                    status,
                    Some("Unable to read master oscillator frequency"),
                )
            })
    }
}

impl<L: MasterOscillatorLibrary> ChannelProvider for MasterOscillatorProvider<L> {
    fn service_init(&mut self) -> Result<(), AidaError> {
        self.library.init().map_err(|status| {
            AidaError::with_status(
                ExceptionKind::ServerInitialisation,
                status,
                Some("initialising Master Oscillator Service"),
            )
        })
    }

    fn request_double(&self, _uri: &str, _arguments: &Arguments) -> Result<f64, AidaError> {
        self.frequency()
    }

    fn request_table(&self, _uri: &str, _arguments: &Arguments) -> Result<Table, AidaError> {
        single_value_table(self.frequency()?)
    }

    fn set_value_with_response(
        &mut self,
        _uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<Table, AidaError> {
        if !self.library.access_enabled() {
            return Err(AidaError::unable_to_set(
                "Aida access to master oscillator is not currently enabled",
            ));
        }
        let scanned = Scanner::new(arguments).with_value(value).scan(&[
            FieldSpec::required("value", AidaType::Float),
            FieldSpec::optional("units", AidaType::String).or(Units::Frequency.name()),
            FieldSpec::optional("ring", AidaType::String),
        ])?;
        let requested: f32 = scanned.get("value")?;
        let units: String = scanned.get("units")?;
        let ring: Option<String> = scanned.get("ring")?;

        let units = if units.eq_ignore_ascii_case(Units::Frequency.name()) {
            Units::Frequency
        } else if units.eq_ignore_ascii_case(Units::Energy.name()) {
            Units::Energy
        } else {
            return Err(AidaError::missing_argument(format!(
                "UNITS must be FREQUENCY or ENERGY, not {units}"
            )));
        };
        if units == Units::Energy && ring.is_none() {
            return Err(AidaError::missing_argument(
                "Master Oscillator Set Variable requires a RING parameter if the UNITS are ENERGY",
            ));
        }

        debug!("Setting master oscillator by {requested} {}", units.name());
        let frequency = self
            .library
            .set(requested, units, ring.as_deref())
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToSetData,
                    status,
                    Some("Unable to set master oscillator"),
                )
            })?;
        single_value_table(f64::from(frequency))
    }
}
