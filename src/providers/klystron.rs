//! SLC klystron status, activation and phase control
//!
//! Channels are `KLYS:<micro>:<unit>:<attribute>`:
//!
//! | Attribute | Get                                 | Set                            |
//! |-----------|-------------------------------------|--------------------------------|
//! | `TACT`    | status word as short, long, string, or a status table | activate or deactivate, returns status |
//! | `PDES`    |                                     | set phase with optional trim, returns phase |
//! | `KPHR`    |                                     | set phase without trim, returns phase |
//! | `PCON`    |                                     | set the PCON config value      |
//! | `ACON`    |                                     | set the ACON config value      |
//!
//! The pseudo channel `KLYSTRONGET:TACT` reads the status table for every
//! device listed in a `devices` argument.

use tracing::debug;

use crate::{
    arguments::Arguments,
    error::{AidaError, ExceptionKind, NativeStatus},
    providers::{ChannelProvider, query_devices},
    scanner::{FieldSpec, Scanner},
    table::{Table, TableBuilder, single_value_table},
    types::AidaType,
    uri,
    value::Value,
    vms::VaxF,
};

/// Device group used when `dgrp` isn't given
pub const DEFAULT_DGRP: &str = "LIN_KLYS";
/// The channel used for multi-device status queries
pub const BULK_URI: &str = "KLYSTRONGET:TACT";
const STATUS_ATTRIBUTE: &str = "TACT";

/// The klystron database and control library
///
/// Device names passed in are either the `KLYS:LI31:31` device or the SLC
/// database name `KLYS:LI31:31.TACT`.
pub trait KlystronLibrary: Send + Sync + 'static {
    fn init(&mut self) -> Result<(), NativeStatus>;

    /// Is AIDA allowed to change klystron settings at the moment?
    fn access_enabled(&self) -> bool;

    fn status(&self, name: &str, beam: &str, dgrp: &str) -> Result<i16, NativeStatus>;

    fn set_config(&mut self, device: &str, value: VaxF, secn: &str) -> Result<(), NativeStatus>;

    /// Set the phase, and return the resulting phase
    fn set_trim_phase(
        &mut self,
        device: &str,
        secn: &str,
        value: VaxF,
        trim: Option<&str>,
    ) -> Result<f32, NativeStatus>;

    fn set_deactivate_or_reactivate(
        &mut self,
        device: &str,
        activate: bool,
        beam: &str,
    ) -> Result<(), NativeStatus>;
}

/// A klystron status word
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct KlystronStatus(pub i16);

impl KlystronStatus {
    pub const ACCEL: i16 = 0x0001;
    pub const STANDBY: i16 = 0x0002;
    pub const BAD: i16 = 0x0004;
    pub const SLED_TUNED: i16 = 0x0010;
    pub const SLEDED: i16 = 0x0020;
    pub const PAMPL: i16 = 0x0040;
    pub const PPHAS: i16 = 0x0080;

    fn has(&self, bit: i16) -> bool {
        self.0 & bit != 0
    }
    pub fn is_accelerating(&self) -> bool {
        self.has(Self::ACCEL)
    }
    pub fn is_in_standby(&self) -> bool {
        self.has(Self::STANDBY)
    }
    pub fn is_bad(&self) -> bool {
        self.has(Self::BAD)
    }
    pub fn is_sled_tuned(&self) -> bool {
        self.has(Self::SLED_TUNED)
    }
    pub fn is_sleded(&self) -> bool {
        self.has(Self::SLEDED)
    }
    pub fn is_pampl(&self) -> bool {
        self.has(Self::PAMPL)
    }
    pub fn is_pphas(&self) -> bool {
        self.has(Self::PPHAS)
    }
}

pub struct KlystronProvider<L: KlystronLibrary> {
    library: L,
}

fn standard_fields() -> [FieldSpec; 2] {
    [
        FieldSpec::required("beam", AidaType::String),
        FieldSpec::optional("dgrp", AidaType::String).or(DEFAULT_DGRP),
    ]
}

impl<L: KlystronLibrary> KlystronProvider<L> {
    pub fn new(library: L) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    fn read_status(&self, name: &str, beam: &str, dgrp: &str) -> Result<KlystronStatus, AidaError> {
        self.library
            .status(name, beam, dgrp)
            .map(KlystronStatus)
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToGetData,
                    status,
                    Some("failed to get klystron status"),
                )
            })
    }

    fn status_of(&self, uri: &str, arguments: &Arguments) -> Result<KlystronStatus, AidaError> {
        let scanned = Scanner::new(arguments).scan(&standard_fields())?;
        self.read_status(
            &uri::slc_name(uri),
            &scanned.get::<String>("beam")?,
            &scanned.get::<String>("dgrp")?,
        )
    }

    fn check_access(&self) -> Result<(), AidaError> {
        if self.library.access_enabled() {
            Ok(())
        } else {
            Err(AidaError::unable_to_set(
                "Aida access to klystron operations is not currently enabled",
            ))
        }
    }

    fn set_phase(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
        secn: &str,
        trim: Option<&str>,
    ) -> Result<Table, AidaError> {
        let scanned = Scanner::new(arguments)
            .with_value(value)
            .scan(&[FieldSpec::required("value", AidaType::Float)])?;
        let requested: f32 = scanned.get("value")?;
        let device = uri::device_name(uri);
        debug!("Setting {secn} of {device} to {requested}, trim {trim:?}");
        let phase = self
            .library
            .set_trim_phase(device, secn, VaxF::from(requested), trim)
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToSetData,
                    status,
                    Some("Error setting value"),
                )
            })?;
        single_value_table(phase)
    }

    fn set_activation(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<Table, AidaError> {
        let [beam_field, dgrp_field] = standard_fields();
        let scanned = Scanner::new(arguments).with_value(value).scan(&[
            FieldSpec::required("value", AidaType::Boolean),
            beam_field,
            dgrp_field,
        ])?;
        let activate: bool = scanned.get("value")?;
        let beam: String = scanned.get("beam")?;
        let dgrp: String = scanned.get("dgrp")?;
        let device = uri::device_name(uri);

        let status = self.read_status(device, &beam, &dgrp)?;
        if activate && !status.is_in_standby() {
            return Err(AidaError::unable_to_set(
                "Cannot reactivate klystron when not in standby state",
            ));
        }
        if !activate && !status.is_accelerating() {
            return Err(AidaError::unable_to_set(
                "Cannot deactivate klystron when not in accelerate state",
            ));
        }

        debug!("{} {device} on beam {beam}", if activate { "Reactivating" } else { "Deactivating" });
        self.library
            .set_deactivate_or_reactivate(device, activate, &beam)
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToSetData,
                    status,
                    Some("Could not set activation state"),
                )
            })?;

        let status = self.read_status(device, &beam, &dgrp)?;
        single_value_table(status.0)
    }
}

impl<L: KlystronLibrary> ChannelProvider for KlystronProvider<L> {
    fn service_init(&mut self) -> Result<(), AidaError> {
        self.library.init().map_err(|status| {
            AidaError::with_status(
                ExceptionKind::ServerInitialisation,
                status,
                Some("initialising Klystron Service"),
            )
        })
    }

    fn request_short(&self, uri: &str, arguments: &Arguments) -> Result<i16, AidaError> {
        Ok(self.status_of(uri, arguments)?.0)
    }

    fn request_long(&self, uri: &str, arguments: &Arguments) -> Result<i64, AidaError> {
        Ok(self.status_of(uri, arguments)?.0.into())
    }

    fn request_string(&self, uri: &str, arguments: &Arguments) -> Result<String, AidaError> {
        let status = self.status_of(uri, arguments)?;
        Ok(if status.0 != 0 { "activated" } else { "deactivated" }.to_string())
    }

    /// Status table, one row per klystron
    ///
    /// Columns are the device name, whether the status could be read, the
    /// status word, then one boolean per status bit. Devices whose status
    /// can't be read have every flag false.
    fn request_table(&self, uri: &str, arguments: &Arguments) -> Result<Table, AidaError> {
        let devices: Vec<String> = if uri.eq_ignore_ascii_case(BULK_URI) {
            Scanner::new(arguments)
                .scan(&[FieldSpec::required("devices", AidaType::StringArray)])?
                .get("devices")?
        } else if uri::has_attribute(uri, STATUS_ATTRIBUTE) {
            vec![uri::device_name(uri).to_string()]
        } else {
            return Err(AidaError::unsupported_channel(uri));
        };
        let scanned = Scanner::new(arguments).scan(&standard_fields())?;
        let beam: String = scanned.get("beam")?;
        let dgrp: String = scanned.get("dgrp")?;

        let results = query_devices(
            &devices,
            |device| {
                let name = uri::slc_name(&format!("{device}:{STATUS_ATTRIBUTE}"));
                self.library.status(&name, &beam, &dgrp)
            },
            "Failed to get any Klystron Device Statuses",
        )?;
        let statuses: Vec<Option<KlystronStatus>> = results
            .iter()
            .map(|r| r.result.as_ref().ok().map(|s| KlystronStatus(*s)))
            .collect();
        let flags = |flag: fn(&KlystronStatus) -> bool| -> Vec<bool> {
            statuses.iter().map(|s| s.as_ref().is_some_and(flag)).collect()
        };

        Ok(TableBuilder::new(devices.len(), 10)?
            .add_column(devices.clone())?
            .add_column(statuses.iter().map(Option::is_some).collect::<Vec<_>>())?
            .add_column(statuses.iter().map(|s| s.unwrap_or_default().0).collect::<Vec<_>>())?
            .add_column(flags(KlystronStatus::is_accelerating))?
            .add_column(flags(KlystronStatus::is_in_standby))?
            .add_column(flags(KlystronStatus::is_bad))?
            .add_column(flags(KlystronStatus::is_sled_tuned))?
            .add_column(flags(KlystronStatus::is_sleded))?
            .add_column(flags(KlystronStatus::is_pampl))?
            .add_column(flags(KlystronStatus::is_pphas))?
            .build()?)
    }

    fn set_value(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<(), AidaError> {
        self.check_access()?;
        let secn = ["PCON", "ACON"]
            .into_iter()
            .find(|secn| uri::has_attribute(uri, secn))
            .ok_or_else(|| AidaError::unsupported_channel(uri))?;
        let scanned = Scanner::new(arguments)
            .with_value(value)
            .scan(&[FieldSpec::required("value", AidaType::Float)])?;
        let requested: f32 = scanned.get("value")?;
        let device = uri::device_name(uri);
        debug!("Setting {secn} of {device} to {requested}");
        self.library
            .set_config(device, VaxF::from(requested), secn)
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::UnableToSetData,
                    status,
                    Some("Could not set configuration value"),
                )
            })
    }

    fn set_value_with_response(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<Table, AidaError> {
        self.check_access()?;
        if uri::has_attribute(uri, STATUS_ATTRIBUTE) {
            self.set_activation(uri, arguments, value)
        } else if uri::has_attribute(uri, "PDES") {
            let trim: bool = Scanner::new(arguments)
                .scan(&[FieldSpec::optional("trim", AidaType::Boolean).or(true)])?
                .get("trim")?;
            self.set_phase(uri, arguments, value, "PDES", Some(if trim { "YES" } else { "NO" }))
        } else if uri::has_attribute(uri, "KPHR") {
            self.set_phase(uri, arguments, value, "KPHR", None)
        } else {
            Err(AidaError::unsupported_channel(uri))
        }
    }
}
